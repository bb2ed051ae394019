//! Circuit breaker implementation using state machines
//!
//! The lifecycle (Closed → Open → HalfOpen → Closed/Open, plus a manual
//! Isolated state) is a `state_machines` dynamic machine. Everything a
//! transition touches lives behind one mutex. Callbacks run only after that
//! lock is released.

use crate::{
    CircuitState,
    builder::CircuitBuilder,
    callbacks::Callbacks,
    clock::{Clock, MonotonicClock},
    config::Config,
    context::Context,
    errors::{BoxError, CircuitError, ConfigError},
    metrics::{HealthMetrics, HealthSummary},
    outcome::{Fault, Outcome},
};
use state_machines::state_machine;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Health metrics plus the time of the most recently recorded outcome
#[derive(Debug)]
struct HealthState {
    metrics: Box<dyn HealthMetrics>,
    recorded_at: Duration,
}

type SharedHealth = Arc<Mutex<HealthState>>;

/// Circuit breaker context - shared data across all states
///
/// The health handle is shared with the breaker; it is only locked while the
/// breaker's state lock is held, so it never sees contention of its own.
#[derive(Clone)]
pub struct CircuitContext {
    pub name: String,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    health: SharedHealth,
}

impl CircuitContext {
    fn new(name: String, config: Config, clock: Arc<dyn Clock>) -> Self {
        let health = Arc::new(Mutex::new(HealthState {
            metrics: config.new_metrics(),
            recorded_at: Duration::ZERO,
        }));
        Self {
            name,
            config,
            clock,
            health,
        }
    }

    fn health_state(&self) -> MutexGuard<'_, HealthState> {
        self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_success(&self, now: Duration) {
        let mut state = self.health_state();
        state.recorded_at = now;
        state.metrics.record_success(now);
    }

    fn record_failure(&self, now: Duration) {
        let mut state = self.health_state();
        state.recorded_at = now;
        state.metrics.record_failure(now);
    }

    fn reset_health(&self, now: Duration) {
        self.health_state().metrics.reset(now);
    }

    /// Health as of the last recorded outcome, so a threshold check sees that sample
    fn recorded_health(&self) -> HealthSummary {
        let state = self.health_state();
        state.metrics.summarize(state.recorded_at)
    }

    fn health(&self) -> HealthSummary {
        let now = self.clock.now();
        self.health_state().metrics.summarize(now)
    }
}

impl Default for CircuitContext {
    fn default() -> Self {
        Self::new(
            String::new(),
            Config::default(),
            Arc::new(MonotonicClock::new()),
        )
    }
}

impl std::fmt::Debug for CircuitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitContext")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("health", &"<dyn HealthMetrics>")
            .finish()
    }
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    /// Calls are rejected until the clock reaches this point
    pub blocked_until: Duration,
}

/// Data specific to the HalfOpen state
#[derive(Debug, Clone, Default)]
pub struct HalfOpenData {
    /// Earliest time the next trial call may be admitted
    pub next_trial_at: Duration,
}

// Define the circuit breaker state machine with dynamic mode
state_machine! {
    name: Circuit,
    context: CircuitContext,
    dynamic: true,  // Enable dynamic mode for runtime state transitions

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
        HalfOpen(HalfOpenData),
        Isolated,
    ],
    events {
        trip {
            guards: [should_break],
            transition: { from: [Closed, HalfOpen], to: Open }
        }
        attempt_reset {
            guards: [break_elapsed],
            transition: { from: Open, to: HalfOpen }
        }
        close {
            guards: [trial_succeeded],
            transition: { from: HalfOpen, to: Closed }
        }
        isolate {
            guards: [isolation_allowed],
            transition: { from: [Closed, Open, HalfOpen], to: Isolated }
        }
    }
}

// Guards for dynamic mode - implemented on typestate machines
impl Circuit<Closed> {
    /// Check whether the health accumulated so far crosses the configured threshold
    fn should_break(&self, ctx: &CircuitContext) -> bool {
        ctx.config.should_break(ctx.recorded_health())
    }

    fn isolation_allowed(&self, _ctx: &CircuitContext) -> bool {
        true
    }
}

impl Circuit<HalfOpen> {
    /// A fault during the trial always reopens the circuit
    fn should_break(&self, _ctx: &CircuitContext) -> bool {
        true
    }

    /// A single successful trial closes the circuit
    fn trial_succeeded(&self, _ctx: &CircuitContext) -> bool {
        true
    }

    fn isolation_allowed(&self, _ctx: &CircuitContext) -> bool {
        true
    }
}

impl Circuit<Open> {
    /// Check if the break has expired for Open -> HalfOpen transition
    fn break_elapsed(&self, ctx: &CircuitContext) -> bool {
        self.state_data_open()
            .is_some_and(|data| ctx.clock.now() >= data.blocked_until)
    }

    fn isolation_allowed(&self, _ctx: &CircuitContext) -> bool {
        true
    }
}

/// Mutable breaker state, only ever touched under the breaker lock
struct BreakerCore<R, E> {
    machine: DynamicCircuit,
    last_fault: Option<Arc<Fault<R, E>>>,
}

impl<R, E> BreakerCore<R, E> {
    fn state(&self) -> CircuitState {
        CircuitState::from_machine(self.machine.current_state())
    }
}

/// Transition discovered under the lock, dispatched after it is released
enum Transition<R, E> {
    Opened {
        fault: Arc<Fault<R, E>>,
        duration: Duration,
    },
    Closed,
}

/// Circuit breaker public API
///
/// `R` is the result type a caller may classify as a fault, `E` the error type.
pub struct CircuitBreaker<R = (), E = BoxError> {
    context: CircuitContext,
    core: Mutex<BreakerCore<R, E>>,
    callbacks: Callbacks<R, E>,
}

impl<R, E> CircuitBreaker<R, E> {
    /// Create a circuit breaker from a complete configuration (use builder() for callbacks)
    pub fn new(name: impl Into<String>, config: Config) -> Result<Self, ConfigError> {
        Self::builder(name).config(config).build()
    }

    /// Breaker that opens after `failures_allowed_before_breaking` faults in a row
    pub fn consecutive(
        name: impl Into<String>,
        failures_allowed_before_breaking: u32,
        duration_of_break: Duration,
    ) -> Result<Self, ConfigError> {
        Self::new(
            name,
            Config::consecutive(failures_allowed_before_breaking, duration_of_break),
        )
    }

    /// Breaker that opens when the failure ratio over a rolling timeslice reaches a threshold
    pub fn rolling_window(
        name: impl Into<String>,
        failure_threshold: f64,
        timeslice: Duration,
        minimum_throughput: u32,
        duration_of_break: Duration,
    ) -> Result<Self, ConfigError> {
        Self::new(
            name,
            Config::rolling_window(
                failure_threshold,
                timeslice,
                minimum_throughput,
                duration_of_break,
            ),
        )
    }

    /// Create a new circuit breaker builder
    pub fn builder(name: impl Into<String>) -> CircuitBuilder<R, E> {
        CircuitBuilder::new(name)
    }

    /// Assemble a breaker from already validated parts (used by builder)
    pub(crate) fn from_parts(
        name: String,
        config: Config,
        clock: Arc<dyn Clock>,
        callbacks: Callbacks<R, E>,
    ) -> Self {
        let context = CircuitContext::new(name, config, clock);
        let machine = DynamicCircuit::new(context.clone());

        Self {
            context,
            core: Mutex::new(BreakerCore {
                machine,
                last_fault: None,
            }),
            callbacks,
        }
    }

    /// Ask whether a call may proceed
    ///
    /// An Open circuit whose break has expired moves to HalfOpen here. HalfOpen
    /// admits one trial per break period; everything else it sees is rejected
    /// like Open.
    pub fn permit(&self) -> Result<(), CircuitError<R, E>> {
        let (decision, half_opened) = {
            let mut core = self.lock();
            let half_opened = self.refresh(&mut core);
            (self.admit(&mut core), half_opened)
        };

        if half_opened {
            self.callbacks.trigger_half_open();
        }
        decision
    }

    /// Report the classified outcome of a permitted call
    pub fn record_outcome(&self, outcome: Outcome<R, E>, ctx: &Context) {
        let transition = {
            let mut core = self.lock();
            let now = self.context.clock.now();

            if core.state() == CircuitState::Isolated {
                tracing::debug!(
                    circuit = %self.context.name,
                    fault = outcome.is_fault(),
                    "ignoring outcome while isolated"
                );
                return;
            }

            match outcome {
                Outcome::Success => self.on_success(&mut core, now),
                Outcome::Fault(fault) => self.on_fault(&mut core, fault, now),
            }
        };

        match transition {
            Some(Transition::Opened { fault, duration }) => {
                self.callbacks.trigger_break(&fault, duration, ctx)
            }
            Some(Transition::Closed) => self.callbacks.trigger_reset(ctx),
            None => {}
        }
    }

    /// Record a successful operation
    pub fn record_success(&self, ctx: &Context) {
        self.record_outcome(Outcome::Success, ctx);
    }

    /// Record a failed operation
    pub fn record_error(&self, error: E, ctx: &Context) {
        self.record_outcome(Outcome::error(error), ctx);
    }

    /// Record a result value the caller classified as a failure
    pub fn record_result(&self, result: R, ctx: &Context) {
        self.record_outcome(Outcome::handled_result(result), ctx);
    }

    /// Force the circuit into the Isolated state until `reset` is called
    ///
    /// Fires `on_break` with `Duration::MAX` on every call, including when the
    /// circuit is already isolated.
    pub fn isolate(&self, ctx: &Context) {
        let fault = {
            let mut core = self.lock();
            if core.state() != CircuitState::Isolated
                && core.machine.handle(CircuitEvent::Isolate).is_err()
            {
                tracing::error!(
                    circuit = %self.context.name,
                    state = %core.state(),
                    "circuit refused to isolate"
                );
                return;
            }

            let fault = Arc::new(Fault::Isolated);
            core.last_fault = Some(Arc::clone(&fault));
            tracing::warn!(circuit = %self.context.name, "circuit isolated manually");
            fault
        };

        self.callbacks.trigger_break(&fault, Duration::MAX, ctx);
    }

    /// Clear all metrics and return the circuit to the Closed state
    ///
    /// `on_reset` fires only when the circuit was not already Closed.
    pub fn reset(&self, ctx: &Context) {
        let prior = {
            let mut core = self.lock();
            let prior = core.state();

            // Recreate machine in Closed state
            core.machine = DynamicCircuit::new(self.context.clone());
            core.last_fault = None;
            self.context.reset_health(self.context.clock.now());
            prior
        };

        if prior != CircuitState::Closed {
            tracing::info!(circuit = %self.context.name, from = %prior, "circuit reset manually");
            self.callbacks.trigger_reset(ctx);
        }
    }

    /// Current state, after applying any pending Open -> HalfOpen transition
    pub fn state(&self) -> CircuitState {
        let (state, half_opened) = {
            let mut core = self.lock();
            let half_opened = self.refresh(&mut core);
            (core.state(), half_opened)
        };

        if half_opened {
            self.callbacks.trigger_half_open();
        }
        state
    }

    /// Check if circuit is open
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Check if circuit is closed
    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// The fault that most recently caused or maintains a break
    pub fn last_fault(&self) -> Option<Arc<Fault<R, E>>> {
        self.lock().last_fault.clone()
    }

    /// Samples currently counting towards the break threshold
    pub fn health(&self) -> HealthSummary {
        let _core = self.lock();
        self.context.health()
    }

    pub fn name(&self) -> &str {
        &self.context.name
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerCore<R, E>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move an expired Open circuit to HalfOpen; true when this call made the transition
    fn refresh(&self, core: &mut BreakerCore<R, E>) -> bool {
        let Some(blocked_until) = core.machine.open_data().map(|data| data.blocked_until) else {
            return false;
        };
        if core.machine.handle(CircuitEvent::AttemptReset).is_err() {
            return false;
        }

        // The first trial is due as soon as the break expired
        if let Some(data) = core.machine.half_open_data_mut() {
            data.next_trial_at = blocked_until;
        }
        tracing::info!(circuit = %self.context.name, "circuit half-open, allowing a trial call");
        true
    }

    fn admit(&self, core: &mut BreakerCore<R, E>) -> Result<(), CircuitError<R, E>> {
        match core.state() {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => {
                let now = self.context.clock.now();
                if let Some(data) = core.machine.half_open_data_mut()
                    && now >= data.next_trial_at
                {
                    // Trials are spread by the same jittered break as the Open period
                    data.next_trial_at = now.saturating_add(self.context.config.effective_break());
                    return Ok(());
                }
                Err(self.open_error(core))
            }
            CircuitState::Open => Err(self.open_error(core)),
            CircuitState::Isolated => Err(CircuitError::Isolated {
                circuit: self.context.name.clone(),
            }),
        }
    }

    fn open_error(&self, core: &BreakerCore<R, E>) -> CircuitError<R, E> {
        CircuitError::Open {
            circuit: self.context.name.clone(),
            last_fault: core.last_fault.clone(),
        }
    }

    fn on_success(&self, core: &mut BreakerCore<R, E>, now: Duration) -> Option<Transition<R, E>> {
        self.context.record_success(now);

        if core.state() == CircuitState::HalfOpen
            && core.machine.handle(CircuitEvent::Close).is_ok()
        {
            self.context.reset_health(now);
            core.last_fault = None;
            tracing::info!(circuit = %self.context.name, "circuit closed after successful trial");
            return Some(Transition::Closed);
        }
        None
    }

    fn on_fault(
        &self,
        core: &mut BreakerCore<R, E>,
        fault: Fault<R, E>,
        now: Duration,
    ) -> Option<Transition<R, E>> {
        self.context.record_failure(now);

        let fault = Arc::new(fault);
        core.last_fault = Some(Arc::clone(&fault));

        // Only Closed (threshold permitting) and HalfOpen accept the trip
        let prior = core.state();
        if core.machine.handle(CircuitEvent::Trip).is_err() {
            return None;
        }

        let duration = self.context.config.effective_break();
        if let Some(data) = core.machine.open_data_mut() {
            data.blocked_until = now.saturating_add(duration);
        }
        tracing::warn!(
            circuit = %self.context.name,
            from = %prior,
            duration_of_break = ?duration,
            "circuit opened"
        );
        Some(Transition::Opened { fault, duration })
    }
}

impl<R, E> std::fmt::Debug for CircuitBreaker<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("context", &self.context)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

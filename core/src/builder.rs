//! Builder API for ergonomic circuit breaker configuration

use crate::{
    callbacks::Callbacks,
    circuit::CircuitBreaker,
    clock::{Clock, MonotonicClock},
    config::{BreakStrategy, Config, duration_from_secs},
    context::Context,
    errors::{ConfigError, Parameter},
    outcome::Fault,
};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_FAILURE_THRESHOLD: f64 = 0.5;
const DEFAULT_TIMESLICE: Duration = Duration::from_secs(60);
const DEFAULT_MINIMUM_THROUGHPUT: u32 = 20;

/// Builder for creating circuit breakers with fluent API
///
/// Starts from [`Config::default`]. Setting any rolling-window parameter
/// switches the strategy to a rolling window, filling unset parameters with a
/// 0.5 failure threshold, a 60 second timeslice and a minimum throughput of 20.
pub struct CircuitBuilder<R, E> {
    name: String,
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    callbacks: Callbacks<R, E>,
    deferred_error: Option<ConfigError>,
}

impl<R, E> CircuitBuilder<R, E> {
    /// Create a new builder for a circuit with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::default(),
            clock: None,
            callbacks: Callbacks::new(),
            deferred_error: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Break after this many consecutive failures
    pub fn consecutive_failures(mut self, failures_allowed_before_breaking: u32) -> Self {
        self.config.strategy = BreakStrategy::ConsecutiveCount {
            failures_allowed_before_breaking,
        };
        self
    }

    /// Set the failure rate threshold (0.0-1.0]
    /// Circuit opens when (failures / calls in timeslice) >= this value
    pub fn failure_rate(mut self, rate: f64) -> Self {
        if let BreakStrategy::RollingWindow {
            failure_threshold, ..
        } = self.rolling_window()
        {
            *failure_threshold = rate;
        }
        self
    }

    /// Set the trailing period failures are measured over
    pub fn timeslice(mut self, duration: Duration) -> Self {
        if let BreakStrategy::RollingWindow { timeslice, .. } = self.rolling_window() {
            *timeslice = duration;
        }
        self
    }

    /// Set the timeslice in seconds
    pub fn timeslice_secs(self, seconds: f64) -> Self {
        match duration_from_secs(Parameter::Timeslice, seconds) {
            Ok(duration) => self.timeslice(duration),
            Err(err) => self.defer(err),
        }
    }

    /// Set minimum number of calls in the timeslice before the rate is evaluated
    pub fn minimum_throughput(mut self, calls: u32) -> Self {
        if let BreakStrategy::RollingWindow {
            minimum_throughput, ..
        } = self.rolling_window()
        {
            *minimum_throughput = calls;
        }
        self
    }

    /// Set how long the circuit stays open (`Duration::MAX` = until reset)
    pub fn duration_of_break(mut self, duration: Duration) -> Self {
        self.config.duration_of_break = duration;
        self
    }

    /// Set the break duration in seconds; `f64::INFINITY` never self-heals
    pub fn duration_of_break_secs(self, seconds: f64) -> Self {
        match duration_from_secs(Parameter::DurationOfBreak, seconds) {
            Ok(duration) => self.duration_of_break(duration),
            Err(err) => self.defer(err),
        }
    }

    /// Set the jitter factor (0.0 = no jitter, 1.0 = full jitter)
    /// Uses chrono-machines formula: duration * (1 - jitter + rand * jitter)
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.config.jitter_factor = factor;
        self
    }

    /// Set the time source (defaults to a monotonic clock)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set callback for when circuit breaks (or is isolated)
    pub fn on_break<F>(mut self, f: F) -> Self
    where
        F: Fn(&Fault<R, E>, Duration, &Context) + Send + Sync + 'static,
    {
        self.callbacks.on_break = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit closes
    pub fn on_reset<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) + Send + Sync + 'static,
    {
        self.callbacks.on_reset = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit enters half-open
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.on_half_open = Some(Arc::new(f));
        self
    }

    /// Build the circuit breaker, validating the configuration
    pub fn build(self) -> Result<CircuitBreaker<R, E>, ConfigError> {
        if let Some(err) = self.deferred_error {
            return Err(err);
        }
        self.config.validate()?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));

        Ok(CircuitBreaker::from_parts(
            self.name,
            self.config,
            clock,
            self.callbacks,
        ))
    }

    fn rolling_window(&mut self) -> &mut BreakStrategy {
        if !matches!(self.config.strategy, BreakStrategy::RollingWindow { .. }) {
            self.config.strategy = BreakStrategy::RollingWindow {
                failure_threshold: DEFAULT_FAILURE_THRESHOLD,
                timeslice: DEFAULT_TIMESLICE,
                minimum_throughput: DEFAULT_MINIMUM_THROUGHPUT,
            };
        }
        &mut self.config.strategy
    }

    // First error wins
    fn defer(mut self, err: ConfigError) -> Self {
        if self.deferred_error.is_none() {
            self.deferred_error = Some(err);
        }
        self
    }
}

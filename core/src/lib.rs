//! CircuitMachines - Circuit breaker engine for resilience policies
//!
//! This crate provides the decision core of a circuit breaker:
//! - State machine for the breaker lifecycle (Closed → Open → HalfOpen, plus manual Isolated)
//! - Consecutive-count and rolling-window health metrics
//! - Injectable monotonic clock, so tests never sleep
//! - Break/reset/half-open callbacks fired outside the breaker lock
//!
//! The caller owns execution: ask [`CircuitBreaker::permit`], run the operation,
//! then report the classified [`Outcome`] with [`CircuitBreaker::record_outcome`].
//!
//! # Example
//!
//! ```rust
//! use circuit_machines::{CircuitBreaker, Context, Outcome};
//! use std::time::Duration;
//!
//! let circuit = CircuitBreaker::<(), String>::builder("my_service")
//!     .failure_rate(0.5)
//!     .timeslice(Duration::from_secs(10))
//!     .minimum_throughput(4)
//!     .duration_of_break(Duration::from_secs(30))
//!     .on_break(|fault, duration, _ctx| {
//!         println!("Circuit opened for {:?} after {:?}", duration, fault)
//!     })
//!     .build()
//!     .unwrap();
//!
//! // Execute with circuit protection
//! let ctx = Context::with_operation_key("charge");
//! if circuit.permit().is_ok() {
//!     let result: Result<(), String> = Ok(());
//!     let outcome = match result {
//!         Ok(()) => Outcome::Success,
//!         Err(e) => Outcome::error(e),
//!     };
//!     circuit.record_outcome(outcome, &ctx);
//! }
//!
//! // Check circuit state
//! if circuit.is_open() {
//!     println!("Circuit is open, skipping call");
//! }
//! ```

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod clock;
pub mod config;
pub mod context;
pub mod errors;
pub mod metrics;
pub mod outcome;

pub use builder::CircuitBuilder;
pub use callbacks::Callbacks;
pub use circuit::CircuitBreaker;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{BreakStrategy, Config, MINIMUM_TIMESLICE};
pub use context::Context;
pub use errors::{BoxError, CircuitError, ConfigError, Parameter};
pub use metrics::{ConsecutiveCountMetrics, HealthMetrics, HealthSummary, RollingWindowMetrics};
pub use outcome::{Fault, Outcome};

/// Externally visible breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
    Isolated,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
            CircuitState::Isolated => "Isolated",
        }
    }

    /// Closed and HalfOpen let calls through; Open and Isolated block them
    pub fn is_permitting(&self) -> bool {
        matches!(self, CircuitState::Closed | CircuitState::HalfOpen)
    }

    /// Map a state name reported by the state machine
    pub(crate) fn from_machine(name: &str) -> Self {
        match name {
            "Open" => CircuitState::Open,
            "HalfOpen" => CircuitState::HalfOpen,
            "Isolated" => CircuitState::Isolated,
            "Closed" => CircuitState::Closed,
            other => unreachable!("circuit machine reported unknown state '{other}'"),
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names_round_trip_through_machine_names() {
        for state in [
            CircuitState::Closed,
            CircuitState::Open,
            CircuitState::HalfOpen,
            CircuitState::Isolated,
        ] {
            assert_eq!(CircuitState::from_machine(state.as_str()), state);
        }
    }

    #[test]
    #[should_panic(expected = "unknown state 'Tripped'")]
    fn test_unknown_machine_state_is_not_reported_as_closed() {
        CircuitState::from_machine("Tripped");
    }

    #[test]
    fn test_permitting_states() {
        assert!(CircuitState::Closed.is_permitting());
        assert!(CircuitState::HalfOpen.is_permitting());
        assert!(!CircuitState::Open.is_permitting());
        assert!(!CircuitState::Isolated.is_permitting());
        assert_eq!(CircuitState::HalfOpen.to_string(), "HalfOpen");
    }
}

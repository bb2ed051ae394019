//! Error types for circuit breaker operations

use crate::outcome::Fault;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Boxed error used as the default fault payload
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Rejections returned by `CircuitBreaker::permit`
#[derive(Debug)]
pub enum CircuitError<R = (), E = BoxError> {
    /// Circuit is open (or half-open with its trial already taken), calls are being rejected
    Open {
        circuit: String,
        last_fault: Option<Arc<Fault<R, E>>>,
    },
    /// Circuit was isolated manually and stays blocked until reset
    Isolated { circuit: String },
}

impl<R, E> CircuitError<R, E> {
    /// Name of the circuit that rejected the call
    pub fn circuit(&self) -> &str {
        match self {
            CircuitError::Open { circuit, .. } | CircuitError::Isolated { circuit } => circuit,
        }
    }

    /// The fault that caused or maintains the break, if any
    pub fn last_fault(&self) -> Option<&Fault<R, E>> {
        match self {
            CircuitError::Open { last_fault, .. } => last_fault.as_deref(),
            CircuitError::Isolated { .. } => None,
        }
    }

    pub fn is_isolated(&self) -> bool {
        matches!(self, CircuitError::Isolated { .. })
    }
}

impl<R, E> fmt::Display for CircuitError<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitError::Open { circuit, .. } => {
                write!(f, "Circuit '{}' is open", circuit)
            }
            CircuitError::Isolated { circuit } => {
                write!(f, "Circuit '{}' is isolated", circuit)
            }
        }
    }
}

impl<R: fmt::Debug, E: fmt::Debug> Error for CircuitError<R, E> {}

/// Configuration parameter named by a [`ConfigError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    FailuresAllowedBeforeBreaking,
    FailureThreshold,
    Timeslice,
    MinimumThroughput,
    DurationOfBreak,
    JitterFactor,
}

impl Parameter {
    pub fn name(&self) -> &'static str {
        match self {
            Parameter::FailuresAllowedBeforeBreaking => "failures_allowed_before_breaking",
            Parameter::FailureThreshold => "failure_threshold",
            Parameter::Timeslice => "timeslice",
            Parameter::MinimumThroughput => "minimum_throughput",
            Parameter::DurationOfBreak => "duration_of_break",
            Parameter::JitterFactor => "jitter_factor",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Invalid breaker configuration, detected at construction
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{parameter} is out of range: got {value}, expected {expected}")]
    OutOfRange {
        parameter: Parameter,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn out_of_range(
        parameter: Parameter,
        value: impl fmt::Debug,
        expected: &'static str,
    ) -> Self {
        ConfigError::OutOfRange {
            parameter,
            value: format!("{:?}", value),
            expected,
        }
    }

    /// The parameter that failed validation
    pub fn parameter(&self) -> Parameter {
        match self {
            ConfigError::OutOfRange { parameter, .. } => *parameter,
        }
    }
}

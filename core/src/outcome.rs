//! Outcomes reported back to a circuit breaker
//!
//! The breaker does not classify anything itself: the caller decides whether an
//! execution was a fault and reports it as an [`Outcome`].

/// A fault that counts against the circuit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault<R, E> {
    /// The operation failed with an error
    Error(E),
    /// The operation returned a result the caller treats as a failure
    Result(R),
    /// Synthetic fault installed by a manual `isolate()`
    Isolated,
}

impl<R, E> Fault<R, E> {
    /// The error payload, if this fault carries one
    pub fn error(&self) -> Option<&E> {
        match self {
            Fault::Error(e) => Some(e),
            _ => None,
        }
    }

    /// The handled result payload, if this fault carries one
    pub fn result(&self) -> Option<&R> {
        match self {
            Fault::Result(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_isolation(&self) -> bool {
        matches!(self, Fault::Isolated)
    }
}

/// Classified result of one protected execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<R, E> {
    Success,
    Fault(Fault<R, E>),
}

impl<R, E> Outcome<R, E> {
    /// Fault outcome wrapping an error
    pub fn error(error: E) -> Self {
        Outcome::Fault(Fault::Error(error))
    }

    /// Fault outcome wrapping a result value classified as a failure
    pub fn handled_result(result: R) -> Self {
        Outcome::Fault(Fault::Result(result))
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Outcome::Fault(_))
    }
}

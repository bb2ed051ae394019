//! Time sources for circuit breakers
//!
//! Every breaker reads time through a [`Clock`] injected at construction:
//! - `MonotonicClock`: `Instant`-anchored time, immune to NTP adjustments
//! - `ManualClock`: externally driven time for deterministic tests and simulations
//!
//! Timestamps are `Duration` offsets from the clock's own anchor. `Duration::MAX`
//! stands for "never" and all arithmetic on timestamps saturates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Abstract time source for circuit breakers
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time as an offset from the clock's anchor
    fn now(&self) -> Duration;
}

/// Monotonic wall time relative to clock creation
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    /// Monotonic time anchor (prevents clock skew issues from NTP)
    start_time: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Clock that only moves when told to
///
/// Share it with a breaker through an `Arc` and advance it from the test:
///
/// ```rust
/// use circuit_machines::{CircuitBreaker, Clock, ManualClock};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::new());
/// let breaker = CircuitBreaker::<(), String>::builder("inventory")
///     .clock(clock.clone())
///     .build()
///     .unwrap();
///
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.now(), Duration::from_secs(5));
/// # let _ = breaker;
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock reading `start`
    pub fn starting_at(start: Duration) -> Self {
        let clock = Self::new();
        clock.set(start);
        clock
    }

    /// Move the clock forward by `by`, saturating at the largest representable time
    pub fn advance(&self, by: Duration) {
        let by = saturating_nanos(by);
        let _ = self
            .nanos
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(by))
            });
    }

    /// Jump to an absolute time
    pub fn set(&self, to: Duration) {
        self.nanos.store(saturating_nanos(to), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_moves_forward() {
        let clock = MonotonicClock::new();

        let time1 = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let time2 = clock.now();

        assert!(time2 > time1);
    }

    #[test]
    fn test_manual_clock_advance_and_set() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);

        clock.advance(Duration::from_millis(250));
        clock.advance(Duration::from_millis(750));
        assert_eq!(clock.now(), Duration::from_secs(1));

        clock.set(Duration::from_secs(42));
        assert_eq!(clock.now(), Duration::from_secs(42));
    }

    #[test]
    fn test_manual_clock_saturates() {
        let clock = ManualClock::starting_at(Duration::from_secs(1));

        clock.advance(Duration::MAX);
        let saturated = clock.now();
        clock.advance(Duration::from_secs(1));

        assert_eq!(clock.now(), saturated);
        assert_eq!(saturated, Duration::from_nanos(u64::MAX));
    }
}

//! Health metrics for circuit breakers
//!
//! This module provides the two accumulation strategies a breaker can use:
//! - `ConsecutiveCountMetrics`: counts failures in an unbroken run
//! - `RollingWindowMetrics`: bucketed success/failure counts over a trailing timeslice
//!
//! Metrics are not synchronised on their own; the owning breaker serialises
//! every access under its state lock.

use std::time::Duration;

/// Smallest bucket width a rolling window will subdivide into
pub const MINIMUM_WINDOW_WIDTH: Duration = Duration::from_millis(20);

/// Number of buckets a rolling window uses when the timeslice is wide enough
pub const DEFAULT_WINDOW_COUNT: usize = 10;

/// Snapshot of the samples currently relevant to threshold evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthSummary {
    /// Successes plus failures that count right now
    pub eligible: u64,
    /// Failures that count right now
    pub failures: u64,
}

impl HealthSummary {
    /// Failure ratio in `[0, 1]`; zero when nothing is eligible
    pub fn failure_rate(&self) -> f64 {
        if self.eligible == 0 {
            0.0
        } else {
            self.failures as f64 / self.eligible as f64
        }
    }
}

/// Abstract accumulation strategy for breaker health
pub trait HealthMetrics: Send + std::fmt::Debug {
    /// Record a successful execution at `now`
    fn record_success(&mut self, now: Duration);

    /// Record a failed execution at `now`
    fn record_failure(&mut self, now: Duration);

    /// Discard everything accumulated so far
    fn reset(&mut self, now: Duration);

    /// Samples relevant at `now`
    fn summarize(&self, now: Duration) -> HealthSummary;
}

/// Failure counter zeroed by any success
#[derive(Debug, Clone, Default)]
pub struct ConsecutiveCountMetrics {
    consecutive_failures: u64,
}

impl ConsecutiveCountMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HealthMetrics for ConsecutiveCountMetrics {
    fn record_success(&mut self, _now: Duration) {
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self, _now: Duration) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    fn reset(&mut self, _now: Duration) {
        self.consecutive_failures = 0;
    }

    fn summarize(&self, _now: Duration) -> HealthSummary {
        HealthSummary {
            eligible: self.consecutive_failures,
            failures: self.consecutive_failures,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    /// Start of the bucket in nanoseconds since the clock anchor
    started_at: u128,
    successes: u64,
    failures: u64,
}

/// Timeslice-aligned ring of buckets approximating a sliding window
///
/// The timeslice is cut into `DEFAULT_WINDOW_COUNT` buckets, or a single bucket
/// when that would make buckets narrower than `MINIMUM_WINDOW_WIDTH`. A bucket is
/// only recycled when a new sample lands in it during a later cycle; stale
/// buckets are skipped by `summarize` until then.
#[derive(Debug, Clone)]
pub struct RollingWindowMetrics {
    timeslice: u128,
    bucket_width: u128,
    buckets: Vec<Bucket>,
}

impl RollingWindowMetrics {
    /// Create metrics covering `timeslice`
    ///
    /// The caller validates the timeslice; a zero timeslice is bumped to one
    /// nanosecond so bucket arithmetic stays defined.
    pub fn new(timeslice: Duration) -> Self {
        let windows = Self::window_count_for(timeslice);
        let timeslice = timeslice.as_nanos().max(1);
        let bucket_width = (timeslice / windows as u128).max(1);

        Self {
            timeslice,
            bucket_width,
            buckets: vec![Bucket::default(); windows],
        }
    }

    /// Number of buckets used for a given timeslice
    pub fn window_count_for(timeslice: Duration) -> usize {
        if timeslice / (DEFAULT_WINDOW_COUNT as u32) < MINIMUM_WINDOW_WIDTH {
            1
        } else {
            DEFAULT_WINDOW_COUNT
        }
    }

    pub fn window_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn window_width(&self) -> Duration {
        nanos_to_duration(self.bucket_width)
    }

    fn current_bucket(&mut self, now: Duration) -> &mut Bucket {
        let now = now.as_nanos();
        let offset = now % self.timeslice;
        let index = ((offset / self.bucket_width) as usize).min(self.buckets.len() - 1);
        let started_at = now - offset + index as u128 * self.bucket_width;

        let bucket = &mut self.buckets[index];
        if bucket.started_at != started_at {
            *bucket = Bucket {
                started_at,
                successes: 0,
                failures: 0,
            };
        }
        bucket
    }
}

impl HealthMetrics for RollingWindowMetrics {
    fn record_success(&mut self, now: Duration) {
        let bucket = self.current_bucket(now);
        bucket.successes = bucket.successes.saturating_add(1);
    }

    fn record_failure(&mut self, now: Duration) {
        let bucket = self.current_bucket(now);
        bucket.failures = bucket.failures.saturating_add(1);
    }

    fn reset(&mut self, _now: Duration) {
        self.buckets.fill(Bucket::default());
    }

    fn summarize(&self, now: Duration) -> HealthSummary {
        let cutoff = now.as_nanos().checked_sub(self.timeslice);

        self.buckets
            .iter()
            .filter(|b| cutoff.is_none_or(|c| b.started_at > c))
            .fold(HealthSummary::default(), |acc, b| HealthSummary {
                eligible: acc
                    .eligible
                    .saturating_add(b.successes)
                    .saturating_add(b.failures),
                failures: acc.failures.saturating_add(b.failures),
            })
    }
}

fn nanos_to_duration(nanos: u128) -> Duration {
    let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
    Duration::new(secs, (nanos % 1_000_000_000) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_consecutive_count_resets_on_success() {
        let mut metrics = ConsecutiveCountMetrics::new();

        metrics.record_failure(ms(0));
        metrics.record_failure(ms(1));
        assert_eq!(
            metrics.summarize(ms(1)),
            HealthSummary {
                eligible: 2,
                failures: 2
            }
        );

        metrics.record_success(ms(2));
        assert_eq!(metrics.summarize(ms(2)), HealthSummary::default());

        metrics.record_failure(ms(3));
        metrics.reset(ms(4));
        assert_eq!(metrics.summarize(ms(4)).failures, 0);
    }

    #[test]
    fn test_window_count_resolution_boundary() {
        assert_eq!(RollingWindowMetrics::window_count_for(ms(199)), 1);
        assert_eq!(RollingWindowMetrics::window_count_for(ms(200)), 10);
        assert_eq!(RollingWindowMetrics::window_count_for(ms(20)), 1);
        assert_eq!(RollingWindowMetrics::window_count_for(ms(10_000)), 10);

        let fine = RollingWindowMetrics::new(ms(10_000));
        assert_eq!(fine.window_count(), 10);
        assert_eq!(fine.window_width(), ms(1_000));

        let coarse = RollingWindowMetrics::new(ms(150));
        assert_eq!(coarse.window_count(), 1);
        assert_eq!(coarse.window_width(), ms(150));
    }

    #[test]
    fn test_rolling_window_sums_live_buckets() {
        let mut metrics = RollingWindowMetrics::new(ms(10_000));

        metrics.record_success(ms(100));
        metrics.record_failure(ms(2_500));
        metrics.record_failure(ms(9_999));

        let summary = metrics.summarize(ms(9_999));
        assert_eq!(summary.eligible, 3);
        assert_eq!(summary.failures, 2);
        assert!((summary.failure_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rolling_window_buckets_roll_off() {
        let mut metrics = RollingWindowMetrics::new(ms(10_000));

        metrics.record_failure(ms(0));
        metrics.record_failure(ms(500));
        metrics.record_failure(ms(5_000));

        // Bucket [0s, 1s) leaves the trailing timeslice exactly at 10s
        assert_eq!(metrics.summarize(ms(9_999)).failures, 3);
        assert_eq!(metrics.summarize(ms(10_000)).failures, 1);
        assert_eq!(metrics.summarize(ms(15_000)).failures, 0);
    }

    #[test]
    fn test_rolling_window_recycles_stale_bucket_lazily() {
        let mut metrics = RollingWindowMetrics::new(ms(10_000));

        metrics.record_failure(ms(1_200));
        metrics.record_failure(ms(1_300));

        // Same index one cycle later: old counts are overwritten, not added to
        metrics.record_success(ms(11_100));
        let summary = metrics.summarize(ms(11_100));
        assert_eq!(summary.eligible, 1);
        assert_eq!(summary.failures, 0);
    }

    #[test]
    fn test_single_bucket_expires_in_one_lump() {
        let mut metrics = RollingWindowMetrics::new(ms(100));

        metrics.record_failure(ms(90));
        metrics.record_failure(ms(95));
        assert_eq!(metrics.summarize(ms(99)).failures, 2);

        assert_eq!(metrics.summarize(ms(100)).failures, 0);
        metrics.record_failure(ms(100));
        assert_eq!(metrics.summarize(ms(100)).failures, 1);
    }

    #[test]
    fn test_rolling_window_reset() {
        let mut metrics = RollingWindowMetrics::new(ms(1_000));

        metrics.record_failure(ms(10));
        metrics.record_success(ms(20));
        metrics.reset(ms(30));

        assert_eq!(metrics.summarize(ms(30)), HealthSummary::default());
    }

    #[test]
    fn test_uneven_timeslice_clamps_last_bucket() {
        let timeslice = Duration::from_nanos(1_000_000_009);
        let mut metrics = RollingWindowMetrics::new(timeslice);

        metrics.record_failure(Duration::from_nanos(1_000_000_005));
        assert_eq!(
            metrics.summarize(Duration::from_nanos(1_000_000_005)).failures,
            1
        );
    }
}

//! Circuit breaker configuration and validation

use crate::errors::{ConfigError, Parameter};
use crate::metrics::{
    ConsecutiveCountMetrics, HealthMetrics, HealthSummary, MINIMUM_WINDOW_WIDTH,
    RollingWindowMetrics,
};
use std::time::Duration;

/// Shortest timeslice a rolling-window breaker accepts
pub const MINIMUM_TIMESLICE: Duration = MINIMUM_WINDOW_WIDTH;

// Resolution of the jitter factor drawn from chrono-machines
const JITTER_SCALE_MS: u64 = 1_000_000;

/// How failures are accumulated and when they break the circuit
#[derive(Debug, Clone, PartialEq)]
pub enum BreakStrategy {
    /// Break after this many failures in a row
    ConsecutiveCount { failures_allowed_before_breaking: u32 },

    /// Break when the failure ratio over a trailing timeslice reaches a threshold
    RollingWindow {
        /// Failure ratio (0.0-1.0] at which the circuit breaks, inclusive
        failure_threshold: f64,
        /// Trailing period the ratio is computed over
        timeslice: Duration,
        /// Minimum number of calls in the timeslice before the ratio is evaluated
        minimum_throughput: u32,
    },
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub strategy: BreakStrategy,

    /// How long the circuit stays open before allowing a trial call.
    /// `Duration::MAX` means it never recovers on its own.
    pub duration_of_break: Duration,

    /// Jitter factor for duration_of_break (0.0 = no jitter, 1.0 = full jitter)
    /// Uses chrono-machines formula: duration * (1 - jitter + rand * jitter)
    pub jitter_factor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: BreakStrategy::ConsecutiveCount {
                failures_allowed_before_breaking: 5,
            },
            duration_of_break: Duration::from_secs(30),
            jitter_factor: 0.0,
        }
    }
}

impl Config {
    /// Consecutive-count configuration
    pub fn consecutive(failures_allowed_before_breaking: u32, duration_of_break: Duration) -> Self {
        Self {
            strategy: BreakStrategy::ConsecutiveCount {
                failures_allowed_before_breaking,
            },
            duration_of_break,
            jitter_factor: 0.0,
        }
    }

    /// Rolling-window configuration
    pub fn rolling_window(
        failure_threshold: f64,
        timeslice: Duration,
        minimum_throughput: u32,
        duration_of_break: Duration,
    ) -> Self {
        Self {
            strategy: BreakStrategy::RollingWindow {
                failure_threshold,
                timeslice,
                minimum_throughput,
            },
            duration_of_break,
            jitter_factor: 0.0,
        }
    }

    /// Check every parameter, reporting the first one out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.strategy {
            BreakStrategy::ConsecutiveCount {
                failures_allowed_before_breaking,
            } => {
                if failures_allowed_before_breaking < 1 {
                    return Err(ConfigError::out_of_range(
                        Parameter::FailuresAllowedBeforeBreaking,
                        failures_allowed_before_breaking,
                        ">= 1",
                    ));
                }
            }
            BreakStrategy::RollingWindow {
                failure_threshold,
                timeslice,
                minimum_throughput,
            } => {
                // Written to reject NaN as well
                if !(failure_threshold > 0.0 && failure_threshold <= 1.0) {
                    return Err(ConfigError::out_of_range(
                        Parameter::FailureThreshold,
                        failure_threshold,
                        "0 < value <= 1",
                    ));
                }
                if timeslice < MINIMUM_TIMESLICE {
                    return Err(ConfigError::out_of_range(
                        Parameter::Timeslice,
                        timeslice,
                        ">= 20ms",
                    ));
                }
                if minimum_throughput < 1 {
                    return Err(ConfigError::out_of_range(
                        Parameter::MinimumThroughput,
                        minimum_throughput,
                        ">= 1",
                    ));
                }
            }
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::out_of_range(
                Parameter::JitterFactor,
                self.jitter_factor,
                "0 <= value <= 1",
            ));
        }

        Ok(())
    }

    /// Fresh metrics matching the strategy
    pub(crate) fn new_metrics(&self) -> Box<dyn HealthMetrics> {
        match self.strategy {
            BreakStrategy::ConsecutiveCount { .. } => Box::new(ConsecutiveCountMetrics::new()),
            BreakStrategy::RollingWindow { timeslice, .. } => {
                Box::new(RollingWindowMetrics::new(timeslice))
            }
        }
    }

    /// Whether the accumulated health is bad enough to break the circuit
    pub fn should_break(&self, health: HealthSummary) -> bool {
        match self.strategy {
            BreakStrategy::ConsecutiveCount {
                failures_allowed_before_breaking,
            } => health.failures >= u64::from(failures_allowed_before_breaking),
            BreakStrategy::RollingWindow {
                failure_threshold,
                minimum_throughput,
                ..
            } => {
                health.eligible >= u64::from(minimum_throughput)
                    && health.failure_rate() >= failure_threshold
            }
        }
    }

    /// Break length to apply now, with jitter when configured
    ///
    /// chrono-machines jitters whole milliseconds, so the jitter is drawn as a
    /// factor against a fixed scale and applied to the exact break duration.
    pub(crate) fn effective_break(&self) -> Duration {
        if self.jitter_factor <= 0.0 || self.duration_of_break == Duration::MAX {
            return self.duration_of_break;
        }

        let policy = chrono_machines::Policy {
            max_attempts: 1,
            base_delay_ms: JITTER_SCALE_MS,
            multiplier: 1.0,
            max_delay_ms: JITTER_SCALE_MS,
        };
        let factor = policy.calculate_delay(1, self.jitter_factor) as f64 / JITTER_SCALE_MS as f64;
        let secs = self.duration_of_break.as_secs_f64() * factor.clamp(0.0, 1.0);
        Duration::try_from_secs_f64(secs).unwrap_or(self.duration_of_break)
    }
}

/// Convert a seconds value to a break-style duration
///
/// Negative and NaN values are out of range for `parameter`; positive infinity
/// maps to `Duration::MAX`.
pub fn duration_from_secs(parameter: Parameter, secs: f64) -> Result<Duration, ConfigError> {
    if secs.is_nan() || secs < 0.0 {
        return Err(ConfigError::out_of_range(parameter, secs, ">= 0 seconds"));
    }
    Ok(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}

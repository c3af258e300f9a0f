//! Retry policies for transient node failures.

use std::time::Duration;

/// Retry strategy applied when a node fails with a transient error.
#[derive(Debug, Clone, Default)]
pub enum RetryPolicy {
    /// Fail immediately on error.
    #[default]
    None,
    /// Constant delay between attempts.
    Fixed { max_attempts: usize, interval: Duration },
    /// Exponentially increasing delay: `base · 2^n`, capped.
    Exponential {
        max_attempts: usize,
        base: Duration,
        max_interval: Duration,
    },
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy::None
    }

    pub fn fixed(max_attempts: usize, interval: Duration) -> Self {
        RetryPolicy::Fixed {
            max_attempts,
            interval,
        }
    }

    pub fn exponential(max_attempts: usize, base: Duration, max_interval: Duration) -> Self {
        RetryPolicy::Exponential {
            max_attempts,
            base,
            max_interval,
        }
    }

    /// True when attempt number `attempt` (0-based) may be retried.
    pub fn should_retry(&self, attempt: usize) -> bool {
        match self {
            RetryPolicy::None => false,
            RetryPolicy::Fixed { max_attempts, .. }
            | RetryPolicy::Exponential { max_attempts, .. } => attempt < *max_attempts,
        }
    }

    /// Delay before retrying after attempt number `attempt`.
    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Fixed { interval, .. } => *interval,
            RetryPolicy::Exponential {
                base, max_interval, ..
            } => {
                let factor = 2u32.saturating_pow(attempt.min(31) as u32);
                base.saturating_mul(factor).min(*max_interval)
            }
        }
    }

    pub fn max_attempts(&self) -> usize {
        match self {
            RetryPolicy::None => 0,
            RetryPolicy::Fixed { max_attempts, .. }
            | RetryPolicy::Exponential { max_attempts, .. } => *max_attempts,
        }
    }
}

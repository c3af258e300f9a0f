//! Circuit breaker for upstream throttling.
//!
//! Counts `rate_limited_upstream` failures; at the threshold the circuit
//! opens and calls fail fast until the reset interval passes, then one probe
//! is allowed (half-open). A success closes the circuit.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerState {
    phase: Phase,
    consecutive_throttles: u32,
    opened_at: Option<Instant>,
}

/// Monitoring view of the breaker.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BreakerSnapshot {
    pub state: &'static str,
    pub consecutive_throttles: u32,
    pub open_for_secs: Option<u64>,
}

/// Per-adapter circuit breaker.
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    failure_threshold: u32,
    reset_after: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_after: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState {
                phase: Phase::Closed,
                consecutive_throttles: 0,
                opened_at: None,
            }),
            failure_threshold,
            reset_after,
        }
    }

    /// Gate before a call. Open circuit fails fast with the remaining wait.
    pub fn check(&self) -> Result<(), GatewayError> {
        let Ok(mut state) = self.state.lock() else {
            return Ok(());
        };
        if state.phase == Phase::Open {
            let elapsed = state.opened_at.map(|t| t.elapsed()).unwrap_or_default();
            if elapsed >= self.reset_after {
                state.phase = Phase::HalfOpen;
                tracing::info!("circuit breaker half-open, probing upstream");
            } else {
                let remaining = (self.reset_after - elapsed).as_secs().max(1);
                return Err(GatewayError::RateLimitedUpstream {
                    retry_after: Some(remaining),
                });
            }
        }
        Ok(())
    }

    pub fn record_success(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.phase = Phase::Closed;
            state.consecutive_throttles = 0;
            state.opened_at = None;
        }
    }

    /// Records one upstream throttle. A half-open probe failing reopens
    /// immediately.
    pub fn record_throttle(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.consecutive_throttles += 1;
            let trip = state.phase == Phase::HalfOpen
                || state.consecutive_throttles >= self.failure_threshold;
            if trip {
                state.phase = Phase::Open;
                state.opened_at = Some(Instant::now());
                tracing::warn!(
                    throttles = state.consecutive_throttles,
                    "circuit breaker opened"
                );
            }
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = match self.state.lock() {
            Ok(s) => s,
            Err(_) => {
                return BreakerSnapshot {
                    state: "closed",
                    consecutive_throttles: 0,
                    open_for_secs: None,
                }
            }
        };
        BreakerSnapshot {
            state: match state.phase {
                Phase::Closed => "closed",
                Phase::Open => "open",
                Phase::HalfOpen => "half_open",
            },
            consecutive_throttles: state.consecutive_throttles,
            open_for_secs: state.opened_at.map(|t| t.elapsed().as_secs()),
        }
    }
}

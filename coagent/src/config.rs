//! Environment-recognized configuration with defaults.
//!
//! Read once at startup via `GatewayConfig::from_env()`; components receive
//! plain values, never the environment.

use std::time::Duration;

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Gateway-wide tunables, one field per recognized environment option.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// `MAX_ITERATIONS`: agent loop cap.
    pub max_iterations: u32,
    /// `RATE_LIMIT_PER_SEC`: ERP adapter token refill rate.
    pub rate_limit_per_sec: f64,
    /// Token bucket capacity (same default as the refill rate).
    pub rate_limit_capacity: f64,
    /// `BULK_MAX_BATCH`: bulk write cap.
    pub bulk_max_batch: usize,
    /// `IDEMPOTENCY_TTL_MS`: write-cache entry lifetime.
    pub idempotency_ttl: Duration,
    /// `SESSION_IDLE_TIMEOUT_MS`: session sweep threshold.
    pub session_idle_timeout: Duration,
    /// Session sweep interval.
    pub session_sweep_interval: Duration,
    /// `KEEP_ALIVE_MS`: SSE keep-alive interval.
    pub keep_alive: Duration,
    /// `WORKFLOW_STATE_TTL_MS`: checkpoint lifetime.
    pub workflow_state_ttl: Duration,
    /// ERP call timeout.
    pub erp_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            rate_limit_per_sec: 10.0,
            rate_limit_capacity: 10.0,
            bulk_max_batch: 50,
            idempotency_ttl: Duration::from_millis(300_000),
            session_idle_timeout: Duration::from_millis(1_800_000),
            session_sweep_interval: Duration::from_secs(300),
            keep_alive: Duration::from_millis(30_000),
            workflow_state_ttl: Duration::from_millis(86_400_000),
            erp_timeout: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    /// Reads every recognized option from the environment, falling back to
    /// the documented defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let rate = env_f64("RATE_LIMIT_PER_SEC", defaults.rate_limit_per_sec);
        Self {
            max_iterations: env_u64("MAX_ITERATIONS", defaults.max_iterations as u64) as u32,
            rate_limit_per_sec: rate,
            rate_limit_capacity: rate,
            bulk_max_batch: env_u64("BULK_MAX_BATCH", defaults.bulk_max_batch as u64) as usize,
            idempotency_ttl: Duration::from_millis(env_u64(
                "IDEMPOTENCY_TTL_MS",
                defaults.idempotency_ttl.as_millis() as u64,
            )),
            session_idle_timeout: Duration::from_millis(env_u64(
                "SESSION_IDLE_TIMEOUT_MS",
                defaults.session_idle_timeout.as_millis() as u64,
            )),
            session_sweep_interval: defaults.session_sweep_interval,
            keep_alive: Duration::from_millis(env_u64(
                "KEEP_ALIVE_MS",
                defaults.keep_alive.as_millis() as u64,
            )),
            workflow_state_ttl: Duration::from_millis(env_u64(
                "WORKFLOW_STATE_TTL_MS",
                defaults.workflow_state_ttl.as_millis() as u64,
            )),
            erp_timeout: defaults.erp_timeout,
        }
    }
}

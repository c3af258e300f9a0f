//! Gateway error taxonomy.
//!
//! One enum for everything that crosses a component boundary; each variant
//! maps to a stable wire code via [`GatewayError::code`]. `Interrupted` is
//! control flow (a workflow approval gate yielding), not a failure.

use thiserror::Error;

use crate::graph::Interrupt;

/// Error for tool execution, ERP calls, agent turns and workflow runs.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Schema validation failed on a tool call or HTTP body. Not retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Tool name not present in the session's filtered registry.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Resume against a prompt that never existed or was already resolved.
    #[error("unknown or resolved prompt: {0}")]
    UnknownPrompt(String),

    /// Approval returned cancel; the pending tool invocation fails.
    #[error("user cancelled the operation")]
    UserCancelled,

    /// Bulk write above the configured cap. No writes are performed.
    #[error("batch limit exceeded: {requested} > {limit}")]
    BatchLimitExceeded { limit: usize, requested: usize },

    /// 5xx or network error from the ERP. Recoverable by workflow retry nodes.
    #[error("erp transient error: {0}")]
    ErpTransient(String),

    /// 4xx from the ERP, final. Carries the ERP-reported message.
    #[error("erp error {status}: {message}")]
    ErpPermanent { status: u16, message: String },

    /// Upstream throttling (LLM or ERP 429, or an open circuit breaker).
    #[error("rate limited upstream (retry after {retry_after:?}s)")]
    RateLimitedUpstream { retry_after: Option<u64> },

    /// The agent loop hit its iteration bound. Fatal to the turn.
    #[error("agent loop exceeded {0} iterations")]
    MaxIterationsExceeded(u32),

    /// A workflow node yielded for human input. Control flow, not a failure.
    #[error("workflow interrupted: {0:?}")]
    Interrupted(Interrupt),

    /// Anything uncaught. The wire message is sanitized; details go to logs.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable wire code for error frames and tool results.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidInput(_) => "invalid_input",
            GatewayError::UnknownTool(_) => "unknown_tool",
            GatewayError::UnknownPrompt(_) => "unknown_or_resolved_prompt",
            GatewayError::UserCancelled => "user_cancelled",
            GatewayError::BatchLimitExceeded { .. } => "batch_limit_exceeded",
            GatewayError::ErpTransient(_) => "erp_transient",
            GatewayError::ErpPermanent { .. } => "erp_permanent",
            GatewayError::RateLimitedUpstream { .. } => "rate_limited_upstream",
            GatewayError::MaxIterationsExceeded(_) => "max_iterations_exceeded",
            GatewayError::Interrupted(_) => "workflow_interrupted",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    /// True for errors a workflow retry node may recover from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::ErpTransient(_) | GatewayError::RateLimitedUpstream { .. }
        )
    }
}

impl From<Interrupt> for GatewayError {
    fn from(interrupt: Interrupt) -> Self {
        GatewayError::Interrupted(interrupt)
    }
}

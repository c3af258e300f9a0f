//! Pending approval resolvers for the agent loop.
//!
//! When a high-risk tool call needs approval, the loop registers a resolver
//! keyed by `prompt_id` and suspends on the receiver. A later `resume`
//! request delivers the decision. Each prompt resolves at most once; the
//! session sweep garbage-collects resolvers of evicted sessions (dropping a
//! sender cancels the waiting tool).

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use stream_frame::ApprovalDecision;

use crate::error::GatewayError;
use crate::risk::RiskAssessment;

/// An approval request as shown to the user and tracked by the loop.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub prompt_id: String,
    pub session_id: String,
    pub operation: String,
    pub input: Value,
    pub risk: RiskAssessment,
    pub preview: String,
}

struct PendingEntry {
    session_id: String,
    tx: oneshot::Sender<ApprovalDecision>,
}

/// Process-wide map of unresolved prompts.
#[derive(Default)]
pub struct PendingApprovals {
    entries: DashMap<String, PendingEntry>,
}

impl PendingApprovals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a prompt and returns the receiver the agent loop awaits.
    pub fn register(
        &self,
        prompt_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> oneshot::Receiver<ApprovalDecision> {
        let (tx, rx) = oneshot::channel();
        self.entries.insert(
            prompt_id.into(),
            PendingEntry {
                session_id: session_id.into(),
                tx,
            },
        );
        rx
    }

    /// Delivers a decision. Fails with `unknown_or_resolved_prompt` when the
    /// prompt never existed or was already resolved.
    pub fn resolve(
        &self,
        prompt_id: &str,
        decision: ApprovalDecision,
    ) -> Result<(), GatewayError> {
        let (_, entry) = self
            .entries
            .remove(prompt_id)
            .ok_or_else(|| GatewayError::UnknownPrompt(prompt_id.to_string()))?;
        // A dropped receiver means the waiting turn is gone; the decision has
        // nowhere to land but the prompt is still consumed.
        let _ = entry.tx.send(decision);
        Ok(())
    }

    /// Drops every resolver belonging to a session. Waiting tools observe a
    /// closed channel and fail as cancelled.
    pub fn gc_session(&self, session_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.session_id != session_id);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

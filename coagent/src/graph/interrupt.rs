//! Interrupt primitive for approval gates.
//!
//! A node calls [`interrupt`] with a payload describing what needs approval.
//! On first execution the call yields (the engine checkpoints and returns
//! control to the caller); when the thread is resumed the same node re-runs
//! and `interrupt` returns the injected decision instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

use super::node::NodeContext;

/// Interrupt payload raised by a node. `value` is shown to the human
/// (operation, preview, risk); `id` optionally names the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interrupt {
    pub value: Value,
    pub id: Option<String>,
}

impl Interrupt {
    pub fn new(value: Value) -> Self {
        Self { value, id: None }
    }

    pub fn with_id(value: Value, id: impl Into<String>) -> Self {
        Self {
            value,
            id: Some(id.into()),
        }
    }
}

/// Pauses the node for human input, or returns the injected decision.
///
/// First execution: no resume value is present, so this returns
/// `Err(GatewayError::Interrupted)` and the engine suspends the thread.
/// After `resume(thread_id, decision)` the node re-runs with the decision in
/// its context and this returns it.
pub fn interrupt(ctx: &NodeContext, payload: Value) -> Result<Value, GatewayError> {
    match ctx.resume_value() {
        Some(decision) => Ok(decision),
        None => Err(GatewayError::Interrupted(Interrupt::new(payload))),
    }
}

//! Graph node trait: one step in a workflow graph.
//!
//! Receives the current state and a per-step context, returns a [`Command`]
//! (partial update + transition). Approval gates read their resume decision
//! from the context via [`interrupt`](super::interrupt).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::GatewayError;

use super::{Command, WorkflowState};

/// Per-step execution context. Carries the resume decision when a node is
/// re-entered after an interrupt.
#[derive(Debug, Clone, Default)]
pub struct NodeContext {
    resume: Option<Value>,
    pub thread_id: Option<String>,
}

impl NodeContext {
    pub fn with_resume(resume: Value) -> Self {
        Self {
            resume: Some(resume),
            thread_id: None,
        }
    }

    pub fn new(resume: Option<Value>, thread_id: Option<String>) -> Self {
        Self { resume, thread_id }
    }

    /// The injected decision, present only on the first node executed after a
    /// resume.
    pub fn resume_value(&self) -> Option<Value> {
        self.resume.clone()
    }
}

/// One step in a graph: state in, command out.
///
/// The engine clones the state per step; nodes never mutate shared state
/// directly. Return `Goto::Next` to follow the declared transition,
/// `Goto::Node(id)` to take a declared jump, `Goto::End` to finish.
#[async_trait]
pub trait Node: Send + Sync {
    /// Node id, unique within a graph.
    fn id(&self) -> &str;

    async fn run(&self, state: WorkflowState, ctx: &NodeContext) -> Result<Command, GatewayError>;
}

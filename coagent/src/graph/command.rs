//! Node return value: a partial state update plus a routing directive.

use serde_json::{Map, Value};

/// Where to go after a node completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Goto {
    /// Follow the declared transition from this node (unconditional edge, or
    /// the conditional router over the updated state).
    Next,
    /// Jump to a named node. Must be a declared transition target.
    Node(String),
    /// Stop; the workflow completes.
    End,
}

/// The outcome of one node: fields to merge into the state (honoring each
/// field's declared reducer) and the transition to take.
#[derive(Debug, Clone)]
pub struct Command {
    pub update: Map<String, Value>,
    pub goto: Goto,
}

impl Command {
    /// Continue along the declared transition with no state change.
    pub fn next() -> Self {
        Self {
            update: Map::new(),
            goto: Goto::Next,
        }
    }

    /// Jump to a named node with no state change.
    pub fn goto(node: impl Into<String>) -> Self {
        Self {
            update: Map::new(),
            goto: Goto::Node(node.into()),
        }
    }

    /// Finish the workflow with no state change.
    pub fn end() -> Self {
        Self {
            update: Map::new(),
            goto: Goto::End,
        }
    }

    /// Adds one field to the update map.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.update.insert(key.into(), value);
        self
    }

    /// Replaces the update map wholesale.
    pub fn with_update(mut self, update: Map<String, Value>) -> Self {
        self.update = update;
        self
    }
}

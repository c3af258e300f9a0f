//! Graph compilation errors.

use thiserror::Error;

/// Raised by `WorkflowGraph::compile` when the declared graph is invalid.
#[derive(Debug, Error)]
pub enum CompilationError {
    #[error("edge references unknown node: {0}")]
    NodeNotFound(String),

    #[error("no edge from START")]
    MissingStart,

    #[error("no path reaches END")]
    MissingEnd,

    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("node has both an outgoing edge and conditional edges: {0}")]
    NodeHasBothEdgeAndConditional(String),

    #[error("conditional path map targets unknown node: {0}")]
    InvalidConditionalPathMap(String),
}

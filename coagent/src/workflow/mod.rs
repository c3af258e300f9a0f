//! Workflow runtime surface: named graphs, instances, reusable nodes, and
//! the agent-facing bridge tool.

pub mod graphs;
mod nodes;
mod registry;
mod runtime;

pub mod bridge;

pub use bridge::WorkflowBridgeTool;
pub use nodes::{ApprovalNode, EscalateNode, LogNotifier, Notifier, NotifyNode, RetryNode};
pub use registry::{WorkflowEntry, WorkflowRegistry};
pub use runtime::{InstanceStatus, InstanceView, WorkflowRunSummary, WorkflowRuntime};

//! Workflow engine: schema-typed state + nodes returning routing commands.
//!
//! Build a [`WorkflowGraph`] with `add_node` / `add_edge(from, to)` using
//! `START` and `END` for entry/exit, plus `add_conditional_edges` for
//! state-based routing. `compile()` validates the graph and produces a
//! [`CompiledGraph`] that runs node-by-node, checkpointing after each step
//! and yielding on [`interrupt`] for human-in-the-loop approval gates.

mod command;
mod compile_error;
mod compiled;
mod interrupt;
mod node;
mod retry;
mod state;
mod state_graph;

pub use command::{Command, Goto};
pub use compile_error::CompilationError;
pub use compiled::{CompiledGraph, RunContext, RunEnd, RunOutcome, StepRecord};
pub use interrupt::{interrupt, Interrupt};
pub use node::{Node, NodeContext};
pub use retry::RetryPolicy;
pub use state::{FieldKind, FieldSpec, Reducer, StateSchema, WorkflowState};
pub use state_graph::{RouterFn, WorkflowGraph, END, START};

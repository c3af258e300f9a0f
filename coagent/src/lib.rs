//! Coagent core: an AI coagent gateway between a conversational LLM and a
//! business ERP.
//!
//! The pieces, leaves first:
//!
//! - [`erp`] — session-token REST adapter with rate limiting, idempotent
//!   writes and a circuit breaker.
//! - [`tools`] + [`risk`] — the typed tool registry with industry filtering
//!   and the pure risk classifier feeding approval gates.
//! - [`session`] — in-memory session store with idle expiry.
//! - [`stream`] — the frame emitter behind every SSE channel.
//! - [`agent`] + [`approval`] — the bounded multi-turn tool-use loop with
//!   pending-resolver approvals.
//! - [`orchestrator`] — request classification and sub-agent routing.
//! - [`graph`] + [`memory`] + [`workflow`] — the checkpointed workflow
//!   engine with interrupt/resume, the registry of named graphs, and the
//!   agent-facing bridge tool.
//!
//! The HTTP surface lives in the `gateway` crate; the wire frame types in
//! `stream-frame`.

pub mod agent;
pub mod approval;
pub mod config;
pub mod erp;
pub mod error;
pub mod graph;
pub mod llm;
pub mod memory;
pub mod message;
pub mod orchestrator;
pub mod risk;
pub mod session;
pub mod stream;
pub mod tools;
pub mod workflow;

pub use agent::{AgentLoop, DEFAULT_SYSTEM_PROMPT};
pub use approval::{ApprovalRequest, PendingApprovals};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use message::Message;

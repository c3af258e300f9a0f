//! Stream frame protocol for the coagent SSE channel.
//!
//! One frame = one SSE event: `{type, correlation_id, timestamp, data}`.
//! Frame types cover the whole conversation surface (message deltas, tool
//! calls/results, approval prompts/responses, status, errors). The approval
//! decision normalizer lives here too so every entry point parses client
//! decisions the same way.

mod decision;
mod frame;

pub use decision::ApprovalDecision;
pub use frame::{payload, FrameType, StreamFrame};

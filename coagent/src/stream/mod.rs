//! Frame emitter: the write side of one SSE channel.
//!
//! One emitter per logical request. Emits are strictly ordered (single
//! bounded channel) and every frame carries the channel's correlation id.
//! After `close()` (or when the receiver is dropped by a disconnecting
//! client) further emits are dropped with a warning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use stream_frame::{payload, FrameType, StreamFrame};

use crate::approval::ApprovalRequest;
use crate::error::GatewayError;

/// Bounded buffer for one channel. Prevents unbounded memory growth when the
/// HTTP sender cannot keep up with the producer.
pub const FRAME_QUEUE_CAPACITY: usize = 128;

/// Write side of one SSE channel. Cheap to clone; all clones share the closed
/// flag, so closing anywhere silences the channel.
#[derive(Clone)]
pub struct FrameEmitter {
    tx: mpsc::Sender<StreamFrame>,
    correlation_id: String,
    closed: Arc<AtomicBool>,
}

impl FrameEmitter {
    /// Creates an emitter and its receiver half with the default capacity.
    pub fn channel(correlation_id: impl Into<String>) -> (Self, mpsc::Receiver<StreamFrame>) {
        let (tx, rx) = mpsc::channel(FRAME_QUEUE_CAPACITY);
        (
            Self {
                tx,
                correlation_id: correlation_id.into(),
                closed: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Emits one frame. Drops silently (with a warning log) after close or
    /// client disconnect.
    pub async fn emit(&self, frame_type: FrameType, data: Value) {
        if self.closed.load(Ordering::Acquire) {
            tracing::warn!(
                correlation_id = %self.correlation_id,
                frame_type = frame_type.as_str(),
                "emit after close, dropping frame"
            );
            return;
        }
        let frame = StreamFrame::new(frame_type, self.correlation_id.clone(), data);
        if self.tx.send(frame).await.is_err() {
            tracing::warn!(
                correlation_id = %self.correlation_id,
                "frame receiver gone (client disconnected?), closing channel"
            );
            self.closed.store(true, Ordering::Release);
        }
    }

    pub async fn emit_message(&self, content: &str) {
        self.emit(FrameType::Message, payload::message(content)).await;
    }

    pub async fn emit_tool_call(&self, tool_id: &str, tool_name: &str, input: &Value) {
        self.emit(FrameType::ToolCall, payload::tool_call(tool_id, tool_name, input))
            .await;
    }

    pub async fn emit_tool_result(&self, tool_id: &str, tool_name: &str, result: &Value) {
        self.emit(
            FrameType::ToolResult,
            payload::tool_result(tool_id, tool_name, result),
        )
        .await;
    }

    pub async fn emit_tool_error(&self, tool_id: &str, tool_name: &str, error: &GatewayError) {
        self.emit(
            FrameType::ToolResult,
            payload::tool_error(tool_id, tool_name, error.code(), &error.to_string()),
        )
        .await;
    }

    pub async fn emit_approval_request(&self, request: &ApprovalRequest) {
        self.emit(
            FrameType::UiPrompt,
            payload::approval_prompt(
                &request.prompt_id,
                &request.operation,
                &request.input,
                request.risk.level.as_str(),
                &request.risk.reasoning,
                &request.preview,
            ),
        )
        .await;
    }

    pub async fn emit_approval_response(&self, prompt_id: &str, approved: bool) {
        self.emit(
            FrameType::UiResponse,
            payload::approval_response(prompt_id, approved),
        )
        .await;
    }

    pub async fn emit_status(&self, status: &str, message: &str) {
        self.emit(FrameType::Status, payload::status(status, message)).await;
    }

    pub async fn emit_workflow_status(
        &self,
        current_step: &str,
        steps_completed: u32,
        state_summary: Value,
    ) {
        self.emit(
            FrameType::Status,
            payload::workflow_status(current_step, steps_completed, state_summary),
        )
        .await;
    }

    pub async fn emit_error(&self, error: &GatewayError) {
        let message = match error {
            // Internal details stay in the logs.
            GatewayError::Internal(detail) => {
                tracing::error!(correlation_id = %self.correlation_id, detail = %detail, "internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        self.emit(FrameType::Error, payload::error(error.code(), &message))
            .await;
    }

    /// Closes the channel; subsequent emits are dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

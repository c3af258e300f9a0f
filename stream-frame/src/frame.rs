//! Frame types and the wire envelope (type + correlation_id + timestamp + data).
//!
//! `StreamFrame::new` stamps the timestamp; the emitter supplies the
//! correlation id. Payload constructors in [`payload`] keep the per-type
//! `data` shapes in one place so emitters and tests agree on field names.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frame type: one variant per event kind on the SSE channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    Message,
    ToolCall,
    ToolResult,
    UiPrompt,
    UiResponse,
    Status,
    Error,
}

impl FrameType {
    /// Wire name of this frame type (the serialized `type` field).
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameType::Message => "message",
            FrameType::ToolCall => "tool_call",
            FrameType::ToolResult => "tool_result",
            FrameType::UiPrompt => "ui_prompt",
            FrameType::UiResponse => "ui_response",
            FrameType::Status => "status",
            FrameType::Error => "error",
        }
    }
}

/// One event on the stream. All frames of one logical request carry the same
/// `correlation_id`, including resume continuations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamFrame {
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    pub correlation_id: String,
    /// ISO 8601 timestamp, stamped at construction.
    pub timestamp: String,
    pub data: Value,
}

impl StreamFrame {
    /// Builds a frame with the current timestamp.
    pub fn new(frame_type: FrameType, correlation_id: impl Into<String>, data: Value) -> Self {
        Self {
            frame_type,
            correlation_id: correlation_id.into(),
            timestamp: Utc::now().to_rfc3339(),
            data,
        }
    }
}

/// Payload constructors, one per frame type. Field names here are the wire
/// contract; emitters must not invent their own shapes.
pub mod payload {
    use serde_json::{json, Value};

    /// `message` frame data: one assistant text delta.
    pub fn message(content: &str) -> Value {
        json!({ "content": content })
    }

    /// `tool_call` frame data.
    pub fn tool_call(tool_id: &str, tool_name: &str, input: &Value) -> Value {
        json!({ "tool_id": tool_id, "tool_name": tool_name, "input": input })
    }

    /// `tool_result` frame data for a successful call.
    pub fn tool_result(tool_id: &str, tool_name: &str, result: &Value) -> Value {
        json!({
            "tool_id": tool_id,
            "tool_name": tool_name,
            "result": result,
            "is_error": false,
        })
    }

    /// `tool_result` frame data for a failed call.
    pub fn tool_error(tool_id: &str, tool_name: &str, code: &str, message: &str) -> Value {
        json!({
            "tool_id": tool_id,
            "tool_name": tool_name,
            "is_error": true,
            "error": code,
            "message": message,
        })
    }

    /// `ui_prompt` frame data: an approval request.
    pub fn approval_prompt(
        prompt_id: &str,
        operation: &str,
        input: &Value,
        risk_level: &str,
        risk_reasoning: &str,
        preview: &str,
    ) -> Value {
        json!({
            "prompt_id": prompt_id,
            "type": "approval",
            "details": {
                "operation": operation,
                "input": input,
                "risk_level": risk_level,
                "risk_reasoning": risk_reasoning,
                "preview": preview,
            },
        })
    }

    /// `ui_response` frame data: the resolution of a prior prompt.
    pub fn approval_response(prompt_id: &str, approved: bool) -> Value {
        json!({
            "prompt_id": prompt_id,
            "approved": approved,
        })
    }

    /// `status` frame data.
    pub fn status(status: &str, message: &str) -> Value {
        json!({ "status": status, "message": message })
    }

    /// `status` frame data for workflow progress.
    pub fn workflow_status(current_step: &str, steps_completed: u32, state_summary: Value) -> Value {
        json!({
            "status": "processing",
            "current_step": current_step,
            "steps_completed": steps_completed,
            "state_summary": state_summary,
        })
    }

    /// `error` frame data.
    pub fn error(code: &str, message: &str) -> Value {
        json!({ "code": code, "message": message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Serialized frame carries `type` as the snake_case wire name.
    #[test]
    fn frame_serializes_with_wire_type_names() {
        let frame = StreamFrame::new(FrameType::ToolCall, "sess-1", payload::message("hi"));
        let v = serde_json::to_value(&frame).unwrap();
        assert_eq!(v["type"], "tool_call");
        assert_eq!(v["correlation_id"], "sess-1");
        assert!(v["timestamp"].as_str().is_some());
        assert_eq!(v["data"]["content"], "hi");
    }

    /// **Scenario**: Every FrameType round-trips through serde with its wire name.
    #[test]
    fn frame_type_round_trip() {
        for t in [
            FrameType::Message,
            FrameType::ToolCall,
            FrameType::ToolResult,
            FrameType::UiPrompt,
            FrameType::UiResponse,
            FrameType::Status,
            FrameType::Error,
        ] {
            let s = serde_json::to_string(&t).unwrap();
            assert_eq!(s, format!("\"{}\"", t.as_str()));
            let back: FrameType = serde_json::from_str(&s).unwrap();
            assert_eq!(back, t);
        }
    }

    /// **Scenario**: Approval prompt payload carries prompt_id and nested details.
    #[test]
    fn approval_prompt_payload_shape() {
        let input = serde_json::json!({"doctype": "Reservation"});
        let v = payload::approval_prompt(
            "p-1",
            "create_doc",
            &input,
            "high",
            "submit on posted document",
            "Create new Reservation",
        );
        assert_eq!(v["prompt_id"], "p-1");
        assert_eq!(v["type"], "approval");
        assert_eq!(v["details"]["operation"], "create_doc");
        assert_eq!(v["details"]["risk_level"], "high");
        assert_eq!(v["details"]["input"]["doctype"], "Reservation");
    }

    /// **Scenario**: Tool error payload sets is_error and the error code.
    #[test]
    fn tool_error_payload_is_error() {
        let v = payload::tool_error("t-1", "create_doc", "user_cancelled", "User rejected.");
        assert_eq!(v["is_error"], true);
        assert_eq!(v["error"], "user_cancelled");
        assert_eq!(v["tool_name"], "create_doc");
    }
}

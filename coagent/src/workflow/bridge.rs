//! Workflow bridge: deterministic multi-step execution as an agent tool.
//!
//! Registered as `execute_workflow_graph`. The bridge validates the initial
//! state, starts the instance bound to the **caller's** emitter (so workflow
//! frames share the agent's channel), and returns a run summary. An
//! interrupted instance reports its thread id so the client can resume.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::error::GatewayError;
use crate::tools::{Tool, ToolContext, ToolSpec};

use super::runtime::WorkflowRuntime;

pub struct WorkflowBridgeTool {
    runtime: Arc<WorkflowRuntime>,
}

impl WorkflowBridgeTool {
    pub fn new(runtime: Arc<WorkflowRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl Tool for WorkflowBridgeTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "execute_workflow_graph".into(),
            description: "Run a named business workflow (e.g. hotel/o2c) with an initial state; \
                          multi-step, checkpointed, pauses for approvals"
                .into(),
            input_schema: json!({
                "type": "object",
                "required": ["graph_name"],
                "properties": {
                    "graph_name": {"type": "string"},
                    "initial_state": {"type": "object"}
                }
            }),
            industry: None,
        }
    }

    async fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value, GatewayError> {
        let graph_name = input
            .get("graph_name")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::InvalidInput("missing 'graph_name'".into()))?;
        let initial_state: Map<String, Value> = input
            .get("initial_state")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let summary = self
            .runtime
            .start(graph_name, initial_state, None, &ctx.emitter)
            .await?;
        Ok(summary.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use stream_frame::FrameType;

    use crate::config::GatewayConfig;
    use crate::erp::{ErpClient, MockTransport};
    use crate::memory::MemorySaver;
    use crate::session::{SessionParams, SessionStore};
    use crate::stream::FrameEmitter;
    use crate::workflow::WorkflowRegistry;

    async fn bridge_ctx() -> (WorkflowBridgeTool, ToolContext, tokio::sync::mpsc::Receiver<stream_frame::StreamFrame>) {
        let runtime = Arc::new(WorkflowRuntime::new(
            Arc::new(WorkflowRegistry::with_builtin_graphs().unwrap()),
            Arc::new(MemorySaver::new()),
        ));
        let store = SessionStore::new(Duration::from_secs(1800));
        let session = store
            .get_or_create(
                None,
                SessionParams {
                    user_id: "u1".into(),
                    doctype: None,
                    doc_name: None,
                    enabled_industries: ["hotel".to_string()].into_iter().collect(),
                },
            )
            .await;
        let (emitter, rx) = FrameEmitter::channel(session.session_id.clone());
        let ctx = ToolContext {
            session,
            erp: Arc::new(ErpClient::new(
                Arc::new(MockTransport::ok()),
                &GatewayConfig::default(),
            )),
            emitter,
        };
        (WorkflowBridgeTool::new(runtime), ctx, rx)
    }

    /// **Scenario**: The bridge starts a workflow on the caller's channel;
    /// status and prompt frames share that channel and the summary reports
    /// the interruption with a resumable thread id.
    #[tokio::test]
    async fn bridge_streams_into_callers_channel() {
        let (bridge, ctx, mut rx) = bridge_ctx().await;
        let result = bridge
            .call(
                json!({
                    "graph_name": "hotel/o2c",
                    "initial_state": {"reservation_id": "R9", "guest_name": "Ada"}
                }),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(result["status"], "interrupted");
        let thread_id = result["thread_id"].as_str().unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.frame_type, FrameType::Status);
        assert_eq!(first.correlation_id, ctx.session.session_id);
        let mut saw_prompt = false;
        while let Ok(frame) = rx.try_recv() {
            if frame.frame_type == FrameType::UiPrompt {
                assert_eq!(frame.data["prompt_id"], thread_id);
                saw_prompt = true;
            }
        }
        assert!(saw_prompt);
    }

    /// **Scenario**: Unknown workflows and invalid state surface invalid_input.
    #[tokio::test]
    async fn bridge_validates_input() {
        let (bridge, ctx, _rx) = bridge_ctx().await;
        let err = bridge
            .call(json!({"graph_name": "ghost/flow"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");

        let err = bridge
            .call(
                json!({"graph_name": "hotel/o2c", "initial_state": {"guest_name": "Ada"}}),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }
}

//! Agent loop: one user turn driven to completion.
//!
//! A bounded iterative reducer over the conversation: each iteration streams
//! one LLM completion; tool calls are executed concurrently (approval-gated
//! where risk demands it) and their results feed back as a synthetic user
//! turn. The loop ends when a completion carries no tool calls, or with an
//! `error` frame at the iteration bound.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::approval::{ApprovalRequest, PendingApprovals};
use crate::error::GatewayError;
use crate::llm::{LlmClient, MessageChunk, UsageTracker};
use crate::message::Message;
use crate::tools::{preview_for, ToolContext, ToolRegistry};

/// System prompt for the default (direct) toolset.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a business copilot working against an ERP. \
Use the available tools to read and change ERP documents on the user's behalf. \
Prefer reading before writing, keep answers short, and summarize tool results in business terms. \
High-risk changes pause for the user's explicit approval; when an operation is cancelled, \
acknowledge it and continue the conversation.";

struct PreparedCall {
    tool_id: String,
    name: String,
    input: Value,
}

/// The bounded multi-turn tool-use loop.
pub struct AgentLoop {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    pending: Arc<PendingApprovals>,
    usage: Arc<UsageTracker>,
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        pending: Arc<PendingApprovals>,
        usage: Arc<UsageTracker>,
        max_iterations: u32,
    ) -> Self {
        Self {
            llm,
            registry,
            pending,
            usage,
            max_iterations,
        }
    }

    /// Executes one prepared call: risk gate, optional approval wait, tool
    /// execution. Returns the tool result; never emits `tool_result` frames
    /// (the caller emits them gathered, in input order).
    async fn execute_call(
        &self,
        call: &PreparedCall,
        ctx: &ToolContext,
    ) -> Result<Value, GatewayError> {
        let risk = self.registry.assess_risk(&call.name, &call.input);
        if risk.requires_approval {
            let request = ApprovalRequest {
                prompt_id: Uuid::new_v4().to_string(),
                session_id: ctx.session.session_id.clone(),
                operation: call.name.clone(),
                input: call.input.clone(),
                preview: preview_for(&call.name, &call.input),
                risk,
            };
            let rx = self
                .pending
                .register(request.prompt_id.clone(), request.session_id.clone());
            ctx.emitter.emit_approval_request(&request).await;
            tracing::info!(
                prompt_id = %request.prompt_id,
                tool = %call.name,
                risk = request.risk.level.as_str(),
                "suspended awaiting approval"
            );
            match rx.await {
                Ok(decision) => {
                    ctx.emitter
                        .emit_approval_response(&request.prompt_id, decision.is_approved())
                        .await;
                    if !decision.is_approved() {
                        return Err(GatewayError::UserCancelled);
                    }
                }
                // Resolver dropped by session GC: treat as cancellation.
                Err(_) => return Err(GatewayError::UserCancelled),
            }
        }
        self.registry.execute(&call.name, call.input.clone(), ctx).await
    }

    /// Drives one user turn. Frames stream through `ctx.emitter`; the
    /// conversation (without the system prompt) persists on the session.
    pub async fn run_turn(
        &self,
        message: &str,
        system_prompt: &str,
        tool_filter: Option<&[String]>,
        ctx: &ToolContext,
    ) -> Result<(), GatewayError> {
        ctx.session.push_messages([Message::user(message)]).await;
        let mut history = vec![Message::system(system_prompt)];
        history.extend(ctx.session.conversation().await);

        let mut tools = self.registry.list(&ctx.session.enabled_industries);
        if let Some(allow) = tool_filter {
            tools.retain(|t| allow.iter().any(|name| name == &t.name));
        }

        let mut cancelled = false;

        for iteration in 0..self.max_iterations {
            tracing::debug!(iteration, "agent turn");
            let (chunk_tx, mut chunk_rx) = mpsc::channel::<MessageChunk>(32);
            let emitter = ctx.emitter.clone();
            let forward = async move {
                while let Some(chunk) = chunk_rx.recv().await {
                    emitter.emit_message(&chunk.content).await;
                }
            };
            let (turn, ()) = tokio::join!(
                self.llm.invoke_stream(&history, &tools, Some(chunk_tx)),
                forward
            );
            let turn = turn?;
            if let Some(usage) = &turn.usage {
                self.usage.record(usage);
            }

            if !turn.content.is_empty() {
                history.push(Message::assistant(turn.content.clone()));
                ctx.session
                    .push_messages([Message::assistant(turn.content)])
                    .await;
            }

            if turn.tool_calls.is_empty() {
                let status = if cancelled { "cancelled" } else { "completed" };
                ctx.emitter.emit_status(status, "turn finished").await;
                return Ok(());
            }

            let calls: Vec<PreparedCall> = turn
                .tool_calls
                .into_iter()
                .map(|tc| PreparedCall {
                    tool_id: tc.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                    name: tc.name,
                    input: tc.arguments,
                })
                .collect();
            for call in &calls {
                ctx.emitter
                    .emit_tool_call(&call.tool_id, &call.name, &call.input)
                    .await;
            }

            // Launch concurrently, then emit results in input-array order.
            let outcomes =
                futures::future::join_all(calls.iter().map(|c| self.execute_call(c, ctx))).await;

            let mut lines = Vec::with_capacity(calls.len());
            for (call, outcome) in calls.iter().zip(outcomes.iter()) {
                match outcome {
                    Ok(result) => {
                        ctx.emitter
                            .emit_tool_result(&call.tool_id, &call.name, result)
                            .await;
                        lines.push(format!("Tool {} returned: {}", call.name, result));
                    }
                    Err(e) => {
                        if matches!(e, GatewayError::UserCancelled) {
                            cancelled = true;
                        }
                        ctx.emitter.emit_tool_error(&call.tool_id, &call.name, e).await;
                        lines.push(format!("Tool {} failed ({}): {}", call.name, e.code(), e));
                    }
                }
            }

            let synthetic = lines.join("\n");
            history.push(Message::user(synthetic.clone()));
            ctx.session.push_messages([Message::user(synthetic)]).await;
        }

        let bound = GatewayError::MaxIterationsExceeded(self.max_iterations);
        tracing::warn!(max_iterations = self.max_iterations, "agent loop hit iteration bound");
        ctx.emitter.emit_error(&bound).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use stream_frame::{ApprovalDecision, FrameType, StreamFrame};

    use crate::config::GatewayConfig;
    use crate::erp::{ErpClient, ErpResponse, MockTransport};
    use crate::llm::{LlmTurn, MockLlm, ToolInvocation};
    use crate::session::{SessionParams, SessionStore};
    use crate::stream::FrameEmitter;
    use crate::tools::register_erp_tools;

    struct Harness {
        agent: Arc<AgentLoop>,
        ctx: ToolContext,
        rx: mpsc::Receiver<StreamFrame>,
        transport: Arc<MockTransport>,
        pending: Arc<PendingApprovals>,
    }

    async fn harness(llm: MockLlm, max_iterations: u32) -> Harness {
        harness_with_transport(llm, max_iterations, Arc::new(MockTransport::ok())).await
    }

    async fn harness_with_transport(
        llm: MockLlm,
        max_iterations: u32,
        transport: Arc<MockTransport>,
    ) -> Harness {
        let mut registry = ToolRegistry::new();
        register_erp_tools(&mut registry);
        let registry = Arc::new(registry);
        let pending = Arc::new(PendingApprovals::new());
        let agent = Arc::new(AgentLoop::new(
            Arc::new(llm),
            registry,
            pending.clone(),
            Arc::new(UsageTracker::new()),
            max_iterations,
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
            erp: Arc::new(ErpClient::new(transport.clone(), &GatewayConfig::default())),
            emitter,
        };
        Harness {
            agent,
            ctx,
            rx,
            transport,
            pending,
        }
    }

    fn tool_turn(name: &str, arguments: Value) -> LlmTurn {
        LlmTurn {
            content: String::new(),
            tool_calls: vec![ToolInvocation {
                id: Some(format!("call-{}", name)),
                name: name.into(),
                arguments,
            }],
            usage: None,
        }
    }

    async fn collect_types(mut rx: mpsc::Receiver<StreamFrame>) -> Vec<(FrameType, Value)> {
        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push((frame.frame_type, frame.data));
        }
        frames
    }

    /// **Scenario**: Read-only query — tool_call, tool_result, final message,
    /// status completed; no ui_prompt.
    #[tokio::test]
    async fn read_only_turn_needs_no_approval() {
        let llm = MockLlm::new(vec![
            tool_turn("room_availability", json!({"guests": 2})),
            LlmTurn::text("Two rooms are available tonight."),
        ]);
        let h = harness(llm, 10).await;

        h.agent
            .run_turn("List rooms for 2 guests tonight", DEFAULT_SYSTEM_PROMPT, None, &h.ctx)
            .await
            .unwrap();
        h.ctx.emitter.close();
        drop(h.ctx);

        let frames = collect_types(h.rx).await;
        let types: Vec<FrameType> = frames.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            types,
            vec![
                FrameType::ToolCall,
                FrameType::ToolResult,
                FrameType::Message,
                FrameType::Status
            ]
        );
        assert!(frames.iter().all(|(t, _)| *t != FrameType::UiPrompt));
        let (_, status) = frames.last().unwrap();
        assert_eq!(status["status"], "completed");
    }

    /// **Scenario**: Approval + cancel — the tool fails with user_cancelled,
    /// no ERP write happens, and the turn ends cancelled.
    #[tokio::test]
    async fn approval_cancel_blocks_write() {
        let llm = MockLlm::new(vec![
            tool_turn(
                "create_doc",
                json!({"doctype": "Reservation", "data": {"guest_name": "John Doe", "room": "101"}}),
            ),
            LlmTurn::text("Understood, I cancelled the reservation."),
        ]);
        let h = harness(llm, 10).await;
        let Harness {
            agent,
            ctx,
            mut rx,
            transport,
            pending,
        } = h;

        let run_ctx = ctx.clone();
        let run = tokio::spawn(async move {
            agent
                .run_turn("Create the reservation", DEFAULT_SYSTEM_PROMPT, None, &run_ctx)
                .await
        });

        // tool_call frame, then the prompt.
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.frame_type, FrameType::ToolCall);
        let prompt = rx.recv().await.unwrap();
        assert_eq!(prompt.frame_type, FrameType::UiPrompt);
        assert!(prompt.data["details"]["preview"]
            .as_str()
            .unwrap()
            .contains("Create new Reservation"));
        assert_eq!(transport.request_count(), 0);

        let prompt_id = prompt.data["prompt_id"].as_str().unwrap();
        pending.resolve(prompt_id, ApprovalDecision::Cancelled).unwrap();

        run.await.unwrap().unwrap();
        ctx.emitter.close();
        drop(ctx);

        let frames = collect_types(rx).await;
        assert_eq!(transport.request_count(), 0, "no ERP write after cancel");
        let (_, response) = frames
            .iter()
            .find(|(t, _)| *t == FrameType::UiResponse)
            .unwrap();
        assert_eq!(response["approved"], false);
        let (_, result) = frames
            .iter()
            .find(|(t, _)| *t == FrameType::ToolResult)
            .unwrap();
        assert_eq!(result["is_error"], true);
        assert_eq!(result["error"], "user_cancelled");
        let (_, status) = frames.last().unwrap();
        assert_eq!(status["status"], "cancelled");
    }

    /// **Scenario**: Approval + approve — exactly one ERP POST, a successful
    /// tool_result, status completed.
    #[tokio::test]
    async fn approval_approve_executes_once() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(ErpResponse {
                status: 200,
                body: json!({"data": {"name": "RES-0001"}}),
            })
        }));
        let llm = MockLlm::new(vec![
            tool_turn(
                "create_doc",
                json!({"doctype": "Reservation", "data": {"guest_name": "John Doe", "room": "101"}}),
            ),
            LlmTurn::text("Reservation RES-0001 created."),
        ]);
        let h = harness_with_transport(llm, 10, transport).await;
        let Harness {
            agent,
            ctx,
            mut rx,
            transport,
            pending,
        } = h;

        let run_ctx = ctx.clone();
        let run = tokio::spawn(async move {
            agent
                .run_turn("Create the reservation", DEFAULT_SYSTEM_PROMPT, None, &run_ctx)
                .await
        });

        let mut prompt_id = None;
        while prompt_id.is_none() {
            let frame = rx.recv().await.unwrap();
            if frame.frame_type == FrameType::UiPrompt {
                prompt_id = Some(frame.data["prompt_id"].as_str().unwrap().to_string());
            }
        }
        pending
            .resolve(&prompt_id.unwrap(), ApprovalDecision::Approved)
            .unwrap();

        run.await.unwrap().unwrap();
        ctx.emitter.close();
        drop(ctx);

        let frames = collect_types(rx).await;
        assert_eq!(transport.request_count(), 1, "exactly one ERP POST");
        let (_, result) = frames
            .iter()
            .find(|(t, _)| *t == FrameType::ToolResult)
            .unwrap();
        assert_eq!(result["is_error"], false);
        assert_eq!(result["result"]["name"], "RES-0001");
        let (_, status) = frames.last().unwrap();
        assert_eq!(status["status"], "completed");
    }

    /// **Scenario**: Tool-only turns hit the bound and emit
    /// max_iterations_exceeded; no status frame claims completion.
    #[tokio::test]
    async fn iteration_bound_emits_error() {
        let llm = MockLlm::new(vec![
            tool_turn("search_doc", json!({"doctype": "Room"})),
            tool_turn("search_doc", json!({"doctype": "Room"})),
            tool_turn("search_doc", json!({"doctype": "Room"})),
        ]);
        let h = harness(llm, 2).await;

        h.agent
            .run_turn("Keep searching", DEFAULT_SYSTEM_PROMPT, None, &h.ctx)
            .await
            .unwrap();
        h.ctx.emitter.close();
        drop(h.ctx);

        let frames = collect_types(h.rx).await;
        let (last_type, last_data) = frames.last().unwrap();
        assert_eq!(*last_type, FrameType::Error);
        assert_eq!(last_data["code"], "max_iterations_exceeded");
        assert!(frames.iter().all(|(t, _)| *t != FrameType::Status));
    }

    /// **Scenario**: An unknown tool becomes an error tool_result and the
    /// model recovers conversationally.
    #[tokio::test]
    async fn unknown_tool_feeds_back_as_error() {
        let llm = MockLlm::new(vec![
            tool_turn("teleport_guest", json!({})),
            LlmTurn::text("I cannot do that."),
        ]);
        let h = harness(llm, 10).await;

        h.agent
            .run_turn("Teleport the guest", DEFAULT_SYSTEM_PROMPT, None, &h.ctx)
            .await
            .unwrap();
        h.ctx.emitter.close();
        drop(h.ctx);

        let frames = collect_types(h.rx).await;
        let (_, result) = frames
            .iter()
            .find(|(t, _)| *t == FrameType::ToolResult)
            .unwrap();
        assert_eq!(result["error"], "unknown_tool");
        let (_, status) = frames.last().unwrap();
        assert_eq!(status["status"], "completed");
    }
}

//! Workflow runtime: instance lifecycle, start and resume.
//!
//! One instance per `thread_id`. A run advances the graph until a terminal
//! or an approval interrupt; an interrupt emits a `ui_prompt` carrying the
//! thread id as prompt handle and leaves the checkpoint chain as the source
//! of truth. `resume` restores the latest checkpoint, re-enters the
//! interrupted node with the decision injected, and streams the continuation
//! through the caller's emitter.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use stream_frame::ApprovalDecision;

use crate::approval::ApprovalRequest;
use crate::error::GatewayError;
use crate::graph::{RunContext, RunEnd, StepRecord};
use crate::memory::Checkpointer;
use crate::risk::{RiskAssessment, RiskLevel};
use crate::stream::FrameEmitter;

use super::registry::{WorkflowEntry, WorkflowRegistry};

/// Instance lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Running,
    Interrupted,
    Completed,
    Failed,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Running => "running",
            InstanceStatus::Interrupted => "interrupted",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Failed => "failed",
        }
    }
}

struct InstanceRecord {
    instance_id: String,
    graph_name: String,
    status: InstanceStatus,
    current_node: Option<String>,
    history: Vec<StepRecord>,
    last_activity: DateTime<Utc>,
}

/// Snapshot of one instance for monitoring and tests.
#[derive(Debug, Clone)]
pub struct InstanceView {
    pub instance_id: String,
    pub graph_name: String,
    pub thread_id: String,
    pub status: InstanceStatus,
    pub current_node: Option<String>,
    pub history: Vec<StepRecord>,
}

/// Result summary of one start/resume call.
#[derive(Debug)]
pub struct WorkflowRunSummary {
    pub thread_id: String,
    pub status: InstanceStatus,
    pub state: Option<Value>,
}

impl WorkflowRunSummary {
    pub fn to_value(&self) -> Value {
        json!({
            "thread_id": self.thread_id,
            "status": self.status.as_str(),
            "state": self.state,
        })
    }
}

fn workflow_gate_risk() -> RiskAssessment {
    RiskAssessment {
        level: RiskLevel::High,
        requires_approval: true,
        reasoning: "workflow approval gate".to_string(),
    }
}

/// Runs workflow instances against the registry and checkpoint store.
pub struct WorkflowRuntime {
    registry: Arc<WorkflowRegistry>,
    checkpointer: Arc<dyn Checkpointer>,
    instances: DashMap<String, InstanceRecord>,
}

impl WorkflowRuntime {
    pub fn new(registry: Arc<WorkflowRegistry>, checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            registry,
            checkpointer,
            instances: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    pub fn instance(&self, thread_id: &str) -> Option<InstanceView> {
        self.instances.get(thread_id).map(|r| InstanceView {
            instance_id: r.instance_id.clone(),
            graph_name: r.graph_name.clone(),
            thread_id: thread_id.to_string(),
            status: r.status,
            current_node: r.current_node.clone(),
            history: r.history.clone(),
        })
    }

    fn record_outcome(
        &self,
        thread_id: &str,
        graph_name: &str,
        status: InstanceStatus,
        current_node: Option<String>,
        visited: &[StepRecord],
    ) {
        let mut record = self
            .instances
            .entry(thread_id.to_string())
            .or_insert_with(|| InstanceRecord {
                instance_id: Uuid::new_v4().to_string(),
                graph_name: graph_name.to_string(),
                status,
                current_node: None,
                history: Vec::new(),
                last_activity: Utc::now(),
            });
        record.status = status;
        record.current_node = current_node;
        record.history.extend(visited.iter().cloned());
        record.last_activity = Utc::now();
    }

    async fn drive(
        &self,
        entry: Arc<WorkflowEntry>,
        state: crate::graph::WorkflowState,
        start_node: Option<String>,
        resume: Option<Value>,
        parent_checkpoint: Option<String>,
        step_offset: i64,
        thread_id: String,
        emitter: &FrameEmitter,
    ) -> Result<WorkflowRunSummary, GatewayError> {
        let ctx = RunContext {
            emitter: Some(emitter.clone()),
            checkpointer: Some(self.checkpointer.clone()),
            thread_id: Some(thread_id.clone()),
            graph_name: entry.name.clone(),
        };

        let outcome = match entry
            .graph
            .run(state, start_node, resume, parent_checkpoint, step_offset, &ctx)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record_outcome(&thread_id, &entry.name, InstanceStatus::Failed, None, &[]);
                return Err(e);
            }
        };

        match outcome.end {
            RunEnd::Completed => {
                self.record_outcome(
                    &thread_id,
                    &entry.name,
                    InstanceStatus::Completed,
                    None,
                    &outcome.visited,
                );
                emitter
                    .emit_status("completed", &format!("workflow {} finished", entry.name))
                    .await;
                Ok(WorkflowRunSummary {
                    thread_id,
                    status: InstanceStatus::Completed,
                    state: Some(Value::Object(outcome.state.into_map())),
                })
            }
            RunEnd::Interrupted { node, interrupt } => {
                self.record_outcome(
                    &thread_id,
                    &entry.name,
                    InstanceStatus::Interrupted,
                    Some(node.clone()),
                    &outcome.visited,
                );
                let request = ApprovalRequest {
                    prompt_id: thread_id.clone(),
                    session_id: emitter.correlation_id().to_string(),
                    operation: interrupt.value["operation"]
                        .as_str()
                        .unwrap_or(&node)
                        .to_string(),
                    preview: interrupt.value["preview"].as_str().unwrap_or("").to_string(),
                    input: interrupt.value,
                    risk: workflow_gate_risk(),
                };
                emitter.emit_approval_request(&request).await;
                Ok(WorkflowRunSummary {
                    thread_id,
                    status: InstanceStatus::Interrupted,
                    state: Some(Value::Object(outcome.state.into_map())),
                })
            }
        }
    }

    /// Starts a workflow instance, streaming progress through `emitter`.
    pub async fn start(
        &self,
        graph_name: &str,
        initial_state: Map<String, Value>,
        thread_id: Option<String>,
        emitter: &FrameEmitter,
    ) -> Result<WorkflowRunSummary, GatewayError> {
        let entry = self
            .registry
            .get(graph_name)
            .ok_or_else(|| GatewayError::InvalidInput(format!("unknown workflow '{}'", graph_name)))?;
        let state = self.registry.validate_state(graph_name, initial_state)?;
        let thread_id = thread_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        tracing::info!(graph = graph_name, thread_id = %thread_id, "workflow start");
        self.record_outcome(&thread_id, graph_name, InstanceStatus::Running, None, &[]);
        self.drive(entry, state, None, None, None, 0, thread_id, emitter)
            .await
    }

    /// Resumes an interrupted thread with a decision. The latest checkpoint
    /// determines the graph, node and state; the interrupted node re-enters
    /// with the decision injected.
    pub async fn resume(
        &self,
        thread_id: &str,
        decision: ApprovalDecision,
        emitter: &FrameEmitter,
    ) -> Result<WorkflowRunSummary, GatewayError> {
        let latest = self
            .checkpointer
            .latest(thread_id)
            .await
            .map_err(|e| GatewayError::Internal(format!("checkpoint load failed: {}", e)))?
            .ok_or_else(|| GatewayError::UnknownPrompt(thread_id.to_string()))?;
        if latest.metadata.status != "interrupted" {
            return Err(GatewayError::UnknownPrompt(thread_id.to_string()));
        }
        let entry = self
            .registry
            .get(&latest.metadata.graph)
            .ok_or_else(|| GatewayError::Internal(format!(
                "checkpoint references unknown workflow '{}'",
                latest.metadata.graph
            )))?;

        tracing::info!(
            graph = %entry.name,
            thread_id = %thread_id,
            node = %latest.metadata.node,
            approved = decision.is_approved(),
            "workflow resume"
        );
        emitter
            .emit_approval_response(thread_id, decision.is_approved())
            .await;
        self.record_outcome(thread_id, &entry.name, InstanceStatus::Running, None, &[]);

        self.drive(
            entry,
            latest.state,
            Some(latest.metadata.node),
            Some(json!(decision.is_approved())),
            Some(latest.id),
            latest.metadata.step,
            thread_id.to_string(),
            emitter,
        )
        .await
    }

    /// Drops expired checkpoint threads and instance records. Instances with
    /// recent activity are kept regardless of status.
    pub async fn sweep(&self, ttl: Duration) -> usize {
        let dropped = match self.checkpointer.sweep_expired(ttl).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "checkpoint sweep failed");
                0
            }
        };
        let cutoff = Utc::now()
            - chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(24));
        self.instances.retain(|_, r| r.last_activity > cutoff);
        dropped
    }
}

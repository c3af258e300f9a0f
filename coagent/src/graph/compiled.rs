//! Compiled graph: immutable, runs node-by-node with checkpointing.
//!
//! Built by `WorkflowGraph::compile`. The run loop clones state per step,
//! applies each node's command through the schema reducers, persists a
//! checkpoint as a child of the previous one, and emits a status frame. An
//! interrupt checkpoints the current node and returns control; `run` with a
//! start node + resume value re-enters that node with the decision injected.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::GatewayError;
use crate::memory::{Checkpoint, CheckpointMetadata, Checkpointer};
use crate::stream::FrameEmitter;

use super::command::Goto;
use super::interrupt::Interrupt;
use super::node::{Node, NodeContext};
use super::retry::RetryPolicy;
use super::state::{StateSchema, WorkflowState};
use super::state_graph::{ConditionalRoute, END};

/// Instance status values recorded in checkpoint metadata.
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_INTERRUPTED: &str = "interrupted";
pub const STATUS_COMPLETED: &str = "completed";

pub(super) enum NextEntry {
    Unconditional(String),
    Conditional(ConditionalRoute),
}

/// Everything a run needs besides the graph itself. Passed explicitly; the
/// engine never reaches into task-local state.
#[derive(Clone)]
pub struct RunContext {
    pub emitter: Option<FrameEmitter>,
    pub checkpointer: Option<Arc<dyn Checkpointer>>,
    pub thread_id: Option<String>,
    pub graph_name: String,
}

/// One executed step, appended to the instance history.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub node: String,
    pub timestamp: String,
    pub outcome: String,
}

/// How a run ended: at a terminal, or suspended at an approval gate.
#[derive(Debug)]
pub enum RunEnd {
    Completed,
    Interrupted { node: String, interrupt: Interrupt },
}

/// Result of one `run` call (which may cover a whole workflow or the slice
/// between two interrupts).
#[derive(Debug)]
pub struct RunOutcome {
    pub state: WorkflowState,
    pub visited: Vec<StepRecord>,
    pub steps_completed: i64,
    pub end: RunEnd,
}

/// Immutable executable graph.
pub struct CompiledGraph {
    schema: StateSchema,
    nodes: HashMap<String, Arc<dyn Node>>,
    initial_node: String,
    next_map: HashMap<String, NextEntry>,
    retry_policy: RetryPolicy,
}

impl CompiledGraph {
    pub(super) fn new(
        schema: StateSchema,
        nodes: HashMap<String, Arc<dyn Node>>,
        initial_node: String,
        next_map: HashMap<String, NextEntry>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            schema,
            nodes,
            initial_node,
            next_map,
            retry_policy,
        }
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn initial_node(&self) -> &str {
        &self.initial_node
    }

    async fn run_node_with_retry(
        &self,
        node: &Arc<dyn Node>,
        state: &WorkflowState,
        node_ctx: &NodeContext,
    ) -> Result<super::Command, GatewayError> {
        let mut attempt = 0;
        loop {
            match node.run(state.clone(), node_ctx).await {
                Ok(command) => return Ok(command),
                Err(GatewayError::Interrupted(i)) => return Err(GatewayError::Interrupted(i)),
                Err(e) if e.is_transient() && self.retry_policy.should_retry(attempt) => {
                    let delay = self.retry_policy.delay(attempt);
                    tracing::debug!(
                        node = node.id(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient node failure, retrying"
                    );
                    if delay > std::time::Duration::ZERO {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn resolve_next(
        &self,
        current: &str,
        goto: &Goto,
        state: &WorkflowState,
    ) -> Result<Option<String>, GatewayError> {
        match goto {
            Goto::End => Ok(None),
            Goto::Node(target) => {
                if target == END {
                    return Ok(None);
                }
                if !self.is_declared_transition(current, target) {
                    return Err(GatewayError::Internal(format!(
                        "node '{}' routed to '{}' without a declared transition",
                        current, target
                    )));
                }
                Ok(Some(target.clone()))
            }
            Goto::Next => match self.next_map.get(current) {
                None => Ok(None),
                Some(NextEntry::Unconditional(target)) => {
                    if target == END {
                        Ok(None)
                    } else {
                        Ok(Some(target.clone()))
                    }
                }
                Some(NextEntry::Conditional(route)) => {
                    let key = (route.router.as_ref())(state);
                    let target = route
                        .path_map
                        .as_ref()
                        .and_then(|m| m.get(&key).cloned())
                        .unwrap_or(key);
                    tracing::debug!(from = current, to = %target, "conditional routing");
                    if target == END {
                        Ok(None)
                    } else if self.nodes.contains_key(&target) {
                        Ok(Some(target))
                    } else {
                        Err(GatewayError::Internal(format!(
                            "conditional route from '{}' targets unknown node '{}'",
                            current, target
                        )))
                    }
                }
            },
        }
    }

    fn is_declared_transition(&self, current: &str, target: &str) -> bool {
        match self.next_map.get(current) {
            Some(NextEntry::Unconditional(t)) => t == target,
            Some(NextEntry::Conditional(route)) => match &route.path_map {
                Some(map) => map.values().any(|t| t == target),
                // Router without a path map may name any registered node.
                None => self.nodes.contains_key(target),
            },
            None => false,
        }
    }

    async fn save_checkpoint(
        &self,
        ctx: &RunContext,
        parent: &mut Option<String>,
        state: &WorkflowState,
        step: i64,
        node: &str,
        status: &str,
    ) -> Result<(), GatewayError> {
        let (Some(cp), Some(thread_id)) = (&ctx.checkpointer, &ctx.thread_id) else {
            return Ok(());
        };
        let checkpoint = Checkpoint::new(
            state.clone(),
            parent.clone(),
            CheckpointMetadata {
                step,
                node: node.to_string(),
                status: status.to_string(),
                graph: ctx.graph_name.clone(),
            },
        );
        let id = cp
            .put(thread_id, &checkpoint)
            .await
            .map_err(|e| GatewayError::Internal(format!("checkpoint save failed: {}", e)))?;
        *parent = Some(id);
        Ok(())
    }

    /// Runs from `start_node` (or the initial node) until a terminal or an
    /// interrupt. `resume` is handed to the first node executed; checkpoints
    /// chain off `parent_checkpoint`, step numbers continue at `step_offset`.
    pub async fn run(
        &self,
        mut state: WorkflowState,
        start_node: Option<String>,
        resume: Option<Value>,
        parent_checkpoint: Option<String>,
        step_offset: i64,
        ctx: &RunContext,
    ) -> Result<RunOutcome, GatewayError> {
        if self.nodes.is_empty() {
            return Err(GatewayError::Internal("empty graph".into()));
        }
        let mut current = match start_node {
            Some(id) if self.nodes.contains_key(&id) => id,
            Some(id) => {
                return Err(GatewayError::Internal(format!(
                    "resume references unknown node '{}'",
                    id
                )))
            }
            None => self.initial_node.clone(),
        };

        let mut resume_slot = resume;
        let mut parent = parent_checkpoint;
        let mut steps = step_offset;
        let mut visited = Vec::new();

        loop {
            let node = self
                .nodes
                .get(&current)
                .cloned()
                .ok_or_else(|| GatewayError::Internal(format!("unknown node '{}'", current)))?;
            tracing::debug!(graph = %ctx.graph_name, node = %current, "node start");

            let node_ctx = NodeContext::new(resume_slot.take(), ctx.thread_id.clone());
            let command = match self.run_node_with_retry(&node, &state, &node_ctx).await {
                Ok(command) => command,
                Err(GatewayError::Interrupted(interrupt)) => {
                    self.save_checkpoint(ctx, &mut parent, &state, steps, &current, STATUS_INTERRUPTED)
                        .await?;
                    visited.push(StepRecord {
                        node: current.clone(),
                        timestamp: chrono::Utc::now().to_rfc3339(),
                        outcome: STATUS_INTERRUPTED.to_string(),
                    });
                    tracing::debug!(graph = %ctx.graph_name, node = %current, "node interrupted");
                    return Ok(RunOutcome {
                        state,
                        visited,
                        steps_completed: steps,
                        end: RunEnd::Interrupted {
                            node: current,
                            interrupt,
                        },
                    });
                }
                Err(e) => {
                    tracing::warn!(graph = %ctx.graph_name, node = %current, error = %e, "node failed");
                    return Err(e);
                }
            };

            self.schema.apply_update(&mut state, &command.update)?;
            steps += 1;
            visited.push(StepRecord {
                node: current.clone(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                outcome: "ok".to_string(),
            });
            self.save_checkpoint(ctx, &mut parent, &state, steps, &current, STATUS_RUNNING)
                .await?;
            if let Some(emitter) = &ctx.emitter {
                emitter
                    .emit_workflow_status(&current, steps as u32, state.summary())
                    .await;
            }

            match self.resolve_next(&current, &command.goto, &state)? {
                Some(next) => current = next,
                None => {
                    self.save_checkpoint(ctx, &mut parent, &state, steps, &current, STATUS_COMPLETED)
                        .await?;
                    tracing::debug!(graph = %ctx.graph_name, "graph complete");
                    return Ok(RunOutcome {
                        state,
                        visited,
                        steps_completed: steps,
                        end: RunEnd::Completed,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap as StdHashMap;

    use crate::graph::{
        interrupt, Command, FieldKind, FieldSpec, NodeContext, StateSchema, WorkflowGraph, START,
    };
    use crate::memory::MemorySaver;

    fn test_ctx() -> RunContext {
        RunContext {
            emitter: None,
            checkpointer: None,
            thread_id: None,
            graph_name: "test/graph".into(),
        }
    }

    struct AddNode {
        id: &'static str,
        delta: i64,
    }

    #[async_trait]
    impl Node for AddNode {
        fn id(&self) -> &str {
            self.id
        }
        async fn run(
            &self,
            state: WorkflowState,
            _ctx: &NodeContext,
        ) -> Result<Command, GatewayError> {
            let current = state.get("total").and_then(Value::as_i64).unwrap_or(0);
            Ok(Command::next().with("total", json!(current + self.delta)))
        }
    }

    struct GateNode {
        id: &'static str,
    }

    #[async_trait]
    impl Node for GateNode {
        fn id(&self) -> &str {
            self.id
        }
        async fn run(
            &self,
            _state: WorkflowState,
            ctx: &NodeContext,
        ) -> Result<Command, GatewayError> {
            let decision = interrupt(ctx, json!({"operation": "gate"}))?;
            let approved = decision.as_bool().unwrap_or(false);
            Ok(Command::next().with("approved", json!(approved)))
        }
    }

    fn schema() -> StateSchema {
        StateSchema::new(vec![
            FieldSpec::new("total", FieldKind::Number).with_default(json!(0)),
            FieldSpec::new("approved", FieldKind::Bool),
        ])
    }

    fn two_step_graph() -> CompiledGraph {
        let mut g = WorkflowGraph::new(schema());
        g.add_node(Arc::new(AddNode { id: "first", delta: 1 }));
        g.add_node(Arc::new(AddNode { id: "second", delta: 2 }));
        g.add_edge(START, "first");
        g.add_edge("first", "second");
        g.add_edge("second", END);
        g.compile().expect("graph compiles")
    }

    /// **Scenario**: A linear graph runs to completion, applying each node's
    /// update in order.
    #[tokio::test]
    async fn linear_graph_runs_to_completion() {
        let graph = two_step_graph();
        let state = graph.schema().init(Default::default()).unwrap();
        let out = graph
            .run(state, None, None, None, 0, &test_ctx())
            .await
            .unwrap();
        assert!(matches!(out.end, RunEnd::Completed));
        assert_eq!(out.state.get("total"), Some(&json!(3)));
        let nodes: Vec<_> = out.visited.iter().map(|r| r.node.as_str()).collect();
        assert_eq!(nodes, ["first", "second"]);
    }

    /// **Scenario**: Conditional edges route on the updated state.
    #[tokio::test]
    async fn conditional_edges_route_by_state() {
        let mut g = WorkflowGraph::new(schema());
        g.add_node(Arc::new(AddNode { id: "decide", delta: 1 }));
        g.add_node(Arc::new(AddNode { id: "odd", delta: 100 }));
        g.add_node(Arc::new(AddNode { id: "even", delta: 10 }));
        g.add_edge(START, "decide");
        g.add_edge("odd", END);
        g.add_edge("even", END);
        let path_map: StdHashMap<String, String> = [
            ("odd".to_string(), "odd".to_string()),
            ("even".to_string(), "even".to_string()),
        ]
        .into_iter()
        .collect();
        g.add_conditional_edges(
            "decide",
            Arc::new(|s: &WorkflowState| {
                let total = s.get("total").and_then(Value::as_i64).unwrap_or(0);
                if total % 2 == 0 { "even".into() } else { "odd".into() }
            }),
            Some(path_map),
        );
        let graph = g.compile().unwrap();

        let state = graph.schema().init(Default::default()).unwrap();
        let out = graph.run(state, None, None, None, 0, &test_ctx()).await.unwrap();
        // decide: 0+1=1 (odd) → odd: +100 = 101
        assert_eq!(out.state.get("total"), Some(&json!(101)));
    }

    /// **Scenario**: A node routing outside its declared transitions fails
    /// rather than entering an undeclared node.
    #[tokio::test]
    async fn undeclared_jump_is_rejected() {
        struct RogueNode;
        #[async_trait]
        impl Node for RogueNode {
            fn id(&self) -> &str {
                "rogue"
            }
            async fn run(
                &self,
                _state: WorkflowState,
                _ctx: &NodeContext,
            ) -> Result<Command, GatewayError> {
                Ok(Command::goto("second"))
            }
        }
        let mut g = WorkflowGraph::new(schema());
        g.add_node(Arc::new(RogueNode));
        g.add_node(Arc::new(AddNode { id: "second", delta: 2 }));
        g.add_node(Arc::new(AddNode { id: "third", delta: 3 }));
        g.add_edge(START, "rogue");
        g.add_edge("rogue", "third");
        g.add_edge("third", END);
        g.add_edge("second", END);
        let graph = g.compile().unwrap();
        let state = graph.schema().init(Default::default()).unwrap();
        let err = graph.run(state, None, None, None, 0, &test_ctx()).await.unwrap_err();
        assert_eq!(err.code(), "internal_error");
    }

    /// **Scenario**: An interrupting node checkpoints and suspends; re-running
    /// from that node with a decision completes the graph deterministically.
    #[tokio::test]
    async fn interrupt_then_resume_completes() {
        let saver = Arc::new(MemorySaver::new());
        let mut g = WorkflowGraph::new(schema());
        g.add_node(Arc::new(AddNode { id: "first", delta: 1 }));
        g.add_node(Arc::new(GateNode { id: "gate" }));
        g.add_node(Arc::new(AddNode { id: "last", delta: 10 }));
        g.add_edge(START, "first");
        g.add_edge("first", "gate");
        g.add_edge("gate", "last");
        g.add_edge("last", END);
        let graph = g.compile().unwrap();

        let ctx = RunContext {
            emitter: None,
            checkpointer: Some(saver.clone()),
            thread_id: Some("t-1".into()),
            graph_name: "test/gate".into(),
        };

        let state = graph.schema().init(Default::default()).unwrap();
        let out = graph.run(state, None, None, None, 0, &ctx).await.unwrap();
        let RunEnd::Interrupted { node, interrupt } = out.end else {
            panic!("expected interrupt");
        };
        assert_eq!(node, "gate");
        assert_eq!(interrupt.value["operation"], "gate");

        // The interrupt checkpoint captured the state before the gate.
        let latest = saver.latest("t-1").await.unwrap().unwrap();
        assert_eq!(latest.metadata.status, STATUS_INTERRUPTED);
        assert_eq!(latest.metadata.node, "gate");
        assert_eq!(latest.state.get("total"), Some(&json!(1)));

        // Resume: re-enter the gate with the decision injected.
        let out = graph
            .run(
                latest.state,
                Some(latest.metadata.node),
                Some(json!(true)),
                Some(latest.id),
                latest.metadata.step,
                &ctx,
            )
            .await
            .unwrap();
        assert!(matches!(out.end, RunEnd::Completed));
        assert_eq!(out.state.get_bool("approved"), Some(true));
        assert_eq!(out.state.get("total"), Some(&json!(11)));

        // Checkpoints form a single-parent chain.
        let all = saver.list("t-1", None, None).await.unwrap();
        for pair in all.windows(2) {
            assert_eq!(pair[1].parent_id.as_deref(), Some(pair[0].id.as_str()));
        }
    }

    /// **Scenario**: Identical initial state and decisions produce an
    /// identical node sequence (determinism).
    #[tokio::test]
    async fn replay_is_deterministic() {
        let run_once = || async {
            let mut g = WorkflowGraph::new(schema());
            g.add_node(Arc::new(AddNode { id: "first", delta: 1 }));
            g.add_node(Arc::new(GateNode { id: "gate" }));
            g.add_node(Arc::new(AddNode { id: "last", delta: 10 }));
            g.add_edge(START, "first");
            g.add_edge("first", "gate");
            g.add_edge("gate", "last");
            g.add_edge("last", END);
            let graph = g.compile().unwrap();
            let ctx = test_ctx();
            let state = graph.schema().init(Default::default()).unwrap();
            let paused = graph.run(state, None, None, None, 0, &ctx).await.unwrap();
            let resumed = graph
                .run(paused.state, Some("gate".into()), Some(json!(true)), None, paused.steps_completed, &ctx)
                .await
                .unwrap();
            let mut nodes: Vec<String> =
                paused.visited.iter().map(|r| r.node.clone()).collect();
            nodes.extend(resumed.visited.iter().map(|r| r.node.clone()));
            (nodes, resumed.state)
        };

        let (nodes_a, state_a) = run_once().await;
        let (nodes_b, state_b) = run_once().await;
        assert_eq!(nodes_a, nodes_b);
        assert_eq!(state_a.as_map(), state_b.as_map());
    }
}

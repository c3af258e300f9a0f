//! Retail fulfillment: stock reservation behind a retry wrapper, escalation
//! to manual review on exhaustion, then pack and dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::GatewayError;
use crate::graph::{
    Command, FieldKind, FieldSpec, Node, NodeContext, RetryPolicy, StateSchema, WorkflowGraph,
    WorkflowState, END, START,
};
use crate::workflow::nodes::{EscalateNode, Notifier, NotifyNode, RetryNode};

fn schema() -> StateSchema {
    StateSchema::new(vec![
        FieldSpec::new("order_id", FieldKind::String).required(),
        FieldSpec::new("stock_available", FieldKind::Bool).with_default(json!(true)),
        FieldSpec::new("stock_reserved", FieldKind::Bool).with_default(json!(false)),
        FieldSpec::new("retry_exhausted", FieldKind::Bool).with_default(json!(false)),
        FieldSpec::new("last_error", FieldKind::String),
        FieldSpec::new("escalated", FieldKind::Bool).with_default(json!(false)),
        FieldSpec::new("status", FieldKind::String).with_default(json!("received")),
        FieldSpec::new("log", FieldKind::List)
            .with_default(json!([]))
            .appending(),
    ])
}

/// The wrapped operation: reserving stock against the warehouse. Fails
/// transiently while `stock_available` is false.
struct ReserveStockNode;

#[async_trait]
impl Node for ReserveStockNode {
    fn id(&self) -> &str {
        "reserve_stock_call"
    }
    async fn run(&self, state: WorkflowState, _ctx: &NodeContext) -> Result<Command, GatewayError> {
        if state.get_bool("stock_available") == Some(false) {
            return Err(GatewayError::ErpTransient("warehouse unavailable".into()));
        }
        Ok(Command::next()
            .with("stock_reserved", json!(true))
            .with("status", json!("stock_reserved"))
            .with("log", json!(["stock reserved"])))
    }
}

struct PackNode;

#[async_trait]
impl Node for PackNode {
    fn id(&self) -> &str {
        "pack"
    }
    async fn run(&self, _state: WorkflowState, _ctx: &NodeContext) -> Result<Command, GatewayError> {
        Ok(Command::next()
            .with("status", json!("packed"))
            .with("log", json!(["order packed"])))
    }
}

struct DispatchNode;

#[async_trait]
impl Node for DispatchNode {
    fn id(&self) -> &str {
        "dispatch"
    }
    async fn run(&self, _state: WorkflowState, _ctx: &NodeContext) -> Result<Command, GatewayError> {
        Ok(Command::next()
            .with("status", json!("dispatched"))
            .with("log", json!(["order dispatched"])))
    }
}

struct ManualReviewNode;

#[async_trait]
impl Node for ManualReviewNode {
    fn id(&self) -> &str {
        "manual_review"
    }
    async fn run(&self, _state: WorkflowState, _ctx: &NodeContext) -> Result<Command, GatewayError> {
        Ok(Command::next()
            .with("status", json!("manual_review"))
            .with("log", json!(["handed to a human"])))
    }
}

/// Builds the retail/fulfillment graph with the given notifier.
pub fn retail_fulfillment_graph(notifier: Arc<dyn Notifier>) -> WorkflowGraph {
    let mut graph = WorkflowGraph::new(schema());
    graph.add_node(Arc::new(RetryNode::new(
        "reserve_stock",
        Arc::new(ReserveStockNode),
        RetryPolicy::exponential(
            3,
            std::time::Duration::from_millis(50),
            std::time::Duration::from_millis(400),
        ),
    )));
    graph.add_node(Arc::new(EscalateNode::new(
        "escalate",
        notifier.clone(),
        "stock reservation needs attention",
    )));
    graph.add_node(Arc::new(NotifyNode::new(
        "notify_dispatch",
        notifier,
        "order dispatched",
        "Order {order_id} dispatched",
    )));
    graph.add_node(Arc::new(PackNode));
    graph.add_node(Arc::new(DispatchNode));
    graph.add_node(Arc::new(ManualReviewNode));

    graph.add_edge(START, "reserve_stock");
    let routes: HashMap<String, String> = [
        ("ok".to_string(), "pack".to_string()),
        ("escalate".to_string(), "escalate".to_string()),
    ]
    .into_iter()
    .collect();
    graph.add_conditional_edges("reserve_stock", RetryNode::router(), Some(routes));
    graph.add_edge("escalate", "manual_review");
    graph.add_edge("manual_review", END);
    graph.add_edge("pack", "dispatch");
    graph.add_edge("dispatch", "notify_dispatch");
    graph.add_edge("notify_dispatch", END);
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RunContext, RunEnd};
    use crate::workflow::nodes::LogNotifier;
    use serde_json::Value;

    fn initial(stock_available: bool) -> serde_json::Map<String, Value> {
        [
            ("order_id".to_string(), json!("SO-1")),
            ("stock_available".to_string(), json!(stock_available)),
        ]
        .into_iter()
        .collect()
    }

    fn ctx() -> RunContext {
        RunContext {
            emitter: None,
            checkpointer: None,
            thread_id: None,
            graph_name: "retail/fulfillment".into(),
        }
    }

    /// **Scenario**: With stock available the order flows reserve → pack →
    /// dispatch → notify.
    #[tokio::test]
    async fn happy_path_dispatches() {
        let graph = retail_fulfillment_graph(Arc::new(LogNotifier)).compile().unwrap();
        let state = graph.schema().init(initial(true)).unwrap();
        let done = graph.run(state, None, None, None, 0, &ctx()).await.unwrap();
        assert!(matches!(done.end, RunEnd::Completed));
        assert_eq!(done.state.get_str("status"), Some("dispatched"));
        let nodes: Vec<_> = done.visited.iter().map(|r| r.node.as_str()).collect();
        assert_eq!(nodes, ["reserve_stock", "pack", "dispatch", "notify_dispatch"]);
    }

    /// **Scenario**: Persistent stock failure exhausts retries and escalates
    /// to manual review; the instance completes at the human terminal.
    #[tokio::test]
    async fn exhaustion_escalates() {
        let graph = retail_fulfillment_graph(Arc::new(LogNotifier)).compile().unwrap();
        let state = graph.schema().init(initial(false)).unwrap();
        let done = graph.run(state, None, None, None, 0, &ctx()).await.unwrap();
        assert!(matches!(done.end, RunEnd::Completed));
        assert_eq!(done.state.get_str("status"), Some("manual_review"));
        assert_eq!(done.state.get_bool("escalated"), Some(true));
        assert!(done
            .state
            .get_str("last_error")
            .unwrap()
            .contains("warehouse unavailable"));
        let nodes: Vec<_> = done.visited.iter().map(|r| r.node.as_str()).collect();
        assert_eq!(nodes, ["reserve_stock", "escalate", "manual_review"]);
    }
}

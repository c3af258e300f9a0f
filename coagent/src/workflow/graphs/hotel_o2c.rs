//! Hotel order-to-cash: check-in through invoice, with two approval gates.
//!
//! check_in → approve_folio ⇒ folio → charges → approve_invoice ⇒ invoice.
//! Either gate rejecting routes to the cancelled terminal.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::GatewayError;
use crate::graph::{
    Command, FieldKind, FieldSpec, Node, NodeContext, StateSchema, WorkflowGraph, WorkflowState,
    END, START,
};
use crate::workflow::nodes::ApprovalNode;

fn schema() -> StateSchema {
    StateSchema::new(vec![
        FieldSpec::new("reservation_id", FieldKind::String).required(),
        FieldSpec::new("guest_name", FieldKind::String).required(),
        FieldSpec::new("checked_in", FieldKind::Bool).with_default(json!(false)),
        FieldSpec::new("folio_id", FieldKind::String),
        FieldSpec::new("charges", FieldKind::List)
            .with_default(json!([]))
            .appending(),
        FieldSpec::new("invoice_id", FieldKind::String),
        FieldSpec::new("folio_approved", FieldKind::Bool),
        FieldSpec::new("invoice_approved", FieldKind::Bool),
        FieldSpec::new("status", FieldKind::String).with_default(json!("in_progress")),
    ])
}

struct CheckInNode;

#[async_trait]
impl Node for CheckInNode {
    fn id(&self) -> &str {
        "check_in"
    }
    async fn run(&self, _state: WorkflowState, _ctx: &NodeContext) -> Result<Command, GatewayError> {
        Ok(Command::next()
            .with("checked_in", json!(true))
            .with("status", json!("checked_in")))
    }
}

struct OpenFolioNode;

#[async_trait]
impl Node for OpenFolioNode {
    fn id(&self) -> &str {
        "folio"
    }
    async fn run(&self, state: WorkflowState, _ctx: &NodeContext) -> Result<Command, GatewayError> {
        let reservation = state.get_str("reservation_id").unwrap_or("UNKNOWN");
        Ok(Command::next()
            .with("folio_id", json!(format!("FOL-{}", reservation)))
            .with("status", json!("folio_open")))
    }
}

struct PostChargesNode;

#[async_trait]
impl Node for PostChargesNode {
    fn id(&self) -> &str {
        "charges"
    }
    async fn run(&self, state: WorkflowState, _ctx: &NodeContext) -> Result<Command, GatewayError> {
        let folio = state.get_str("folio_id").unwrap_or("UNKNOWN");
        Ok(Command::next()
            .with(
                "charges",
                json!([{"folio": folio, "item": "room_night", "amount": 180.0}]),
            )
            .with("status", json!("charges_posted")))
    }
}

struct RaiseInvoiceNode;

#[async_trait]
impl Node for RaiseInvoiceNode {
    fn id(&self) -> &str {
        "invoice"
    }
    async fn run(&self, state: WorkflowState, _ctx: &NodeContext) -> Result<Command, GatewayError> {
        let reservation = state.get_str("reservation_id").unwrap_or("UNKNOWN");
        Ok(Command::next()
            .with("invoice_id", json!(format!("INV-{}", reservation)))
            .with("status", json!("invoiced")))
    }
}

struct CancelledNode;

#[async_trait]
impl Node for CancelledNode {
    fn id(&self) -> &str {
        "cancelled"
    }
    async fn run(&self, _state: WorkflowState, _ctx: &NodeContext) -> Result<Command, GatewayError> {
        Ok(Command::next().with("status", json!("cancelled")))
    }
}

/// Builds the hotel/o2c graph.
pub fn hotel_o2c_graph() -> WorkflowGraph {
    let mut graph = WorkflowGraph::new(schema());
    graph.add_node(Arc::new(CheckInNode));
    graph.add_node(Arc::new(ApprovalNode::new(
        "approve_folio",
        "open_folio",
        "Open folio for guest {guest_name} (reservation {reservation_id})",
        "folio_approved",
    )));
    graph.add_node(Arc::new(OpenFolioNode));
    graph.add_node(Arc::new(PostChargesNode));
    graph.add_node(Arc::new(ApprovalNode::new(
        "approve_invoice",
        "raise_invoice",
        "Raise invoice for folio {folio_id} ({guest_name})",
        "invoice_approved",
    )));
    graph.add_node(Arc::new(RaiseInvoiceNode));
    graph.add_node(Arc::new(CancelledNode));

    graph.add_edge(START, "check_in");
    graph.add_edge("check_in", "approve_folio");
    let folio_routes: HashMap<String, String> = [
        ("approved".to_string(), "folio".to_string()),
        ("rejected".to_string(), "cancelled".to_string()),
    ]
    .into_iter()
    .collect();
    graph.add_conditional_edges(
        "approve_folio",
        ApprovalNode::router("folio_approved"),
        Some(folio_routes),
    );
    graph.add_edge("folio", "charges");
    graph.add_edge("charges", "approve_invoice");
    let invoice_routes: HashMap<String, String> = [
        ("approved".to_string(), "invoice".to_string()),
        ("rejected".to_string(), "cancelled".to_string()),
    ]
    .into_iter()
    .collect();
    graph.add_conditional_edges(
        "approve_invoice",
        ApprovalNode::router("invoice_approved"),
        Some(invoice_routes),
    );
    graph.add_edge("invoice", END);
    graph.add_edge("cancelled", END);
    graph
}

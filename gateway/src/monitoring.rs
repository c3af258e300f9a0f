//! Operational metrics: LLM spend and ERP circuit-breaker state.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Map, Value};

use super::app::AppState;

pub(crate) async fn handle_costs(State(state): State<Arc<AppState>>) -> Json<Value> {
    let (totals, calls) = state.usage.totals();
    Json(json!({
        "llm_calls": calls,
        "prompt_tokens": totals.prompt_tokens,
        "completion_tokens": totals.completion_tokens,
        "total_tokens": totals.total_tokens,
    }))
}

pub(crate) async fn handle_circuit_breaker(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut by_session = Map::new();
    for entry in state.adapters.iter() {
        let snapshot = entry.value().breaker_snapshot();
        by_session.insert(
            entry.key().clone(),
            serde_json::to_value(snapshot).unwrap_or(Value::Null),
        );
    }
    Json(json!({ "adapters": by_session }))
}

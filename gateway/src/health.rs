//! `GET /health`: component readiness.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::app::AppState;

pub(crate) async fn handle_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let sessions = state.sessions.stats().await;
    Json(json!({
        "status": "ok",
        "components": {
            "sessions": {
                "total": sessions.total,
                "active": sessions.active,
                "idle": sessions.idle,
            },
            "tools": state.registry.len(),
            "workflows": state.workflows.registry().len(),
            "pending_approvals": state.pending.len(),
        },
    }))
}

//! `POST /agui`: open a session-correlated SSE stream for one request.
//!
//! With `graph_name` the workflow path runs directly; otherwise the
//! orchestrator classifies and routes the message. The handler returns the
//! stream immediately; the run continues in a spawned task emitting frames.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use coagent::session::SessionParams;
use coagent::stream::FrameEmitter;
use coagent::tools::ToolContext;

use super::app::AppState;
use super::sse::frame_stream_response;

#[derive(Debug, Deserialize)]
pub(crate) struct AguiRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub doctype: Option<String>,
    #[serde(default)]
    pub doc_name: Option<String>,
    #[serde(default)]
    pub enabled_industries: Option<Vec<String>>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub graph_name: Option<String>,
    #[serde(default)]
    pub initial_state: Option<Map<String, Value>>,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "invalid_input", "message": message})),
    )
        .into_response()
}

pub(crate) async fn handle_agui(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AguiRequest>,
) -> Response {
    if request.user_id.trim().is_empty() {
        return bad_request("user_id is required");
    }
    if request.message.is_none() && request.graph_name.is_none() {
        return bad_request("either message or graph_name is required");
    }

    let enabled_industries: HashSet<String> = request
        .enabled_industries
        .unwrap_or_default()
        .into_iter()
        .collect();
    let session = state
        .sessions
        .get_or_create(
            request.session_id.as_deref(),
            SessionParams {
                user_id: request.user_id,
                doctype: request.doctype,
                doc_name: request.doc_name,
                enabled_industries,
            },
        )
        .await;

    if let (Some(doctype), Some(doc_name)) = (&session.doctype, &session.doc_name) {
        session
            .set_context("document", json!({"doctype": doctype, "name": doc_name}))
            .await;
    }

    let erp = state.adapter_for(&session.session_id);
    let (emitter, rx) = FrameEmitter::channel(session.session_id.clone());
    let ctx = ToolContext {
        session,
        erp,
        emitter: emitter.clone(),
    };

    let app = state.clone();
    tokio::spawn(async move {
        emitter.emit_status("processing", "request accepted").await;
        let result = if let Some(graph_name) = request.graph_name {
            let initial_state = request.initial_state.unwrap_or_default();
            app.workflows
                .start(&graph_name, initial_state, None, &emitter)
                .await
                .map(|_| ())
        } else {
            let message = request.message.unwrap_or_default();
            app.orchestrator().handle(&message, &ctx).await
        };
        if let Err(e) = result {
            emitter.emit_error(&e).await;
        }
        emitter.close();
    });

    frame_stream_response(rx, state.config.keep_alive)
}

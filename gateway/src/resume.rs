//! `POST /agui/resume`: resolve a pending approval or workflow interrupt.
//!
//! Agent-loop prompts (`prompt_id`) resolve through the pending-resolver map
//! and answer `{ok: true}` as JSON — the frames continue on the original,
//! still-open channel. Workflow interrupts (`thread_id`) answer with a new
//! SSE stream carrying the continuation under the session's correlation id.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use coagent::stream::FrameEmitter;
use stream_frame::ApprovalDecision;

use super::app::AppState;
use super::sse::frame_stream_response;

#[derive(Debug, Deserialize)]
pub(crate) struct ResumeRequest {
    pub session_id: String,
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub decision: ApprovalDecision,
}

pub(crate) async fn handle_resume(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResumeRequest>,
) -> Response {
    if let Some(prompt_id) = request.prompt_id {
        return match state.pending.resolve(&prompt_id, request.decision) {
            Ok(()) => Json(json!({"ok": true})).into_response(),
            Err(e) => (
                StatusCode::NOT_FOUND,
                Json(json!({"ok": false, "error": e.code(), "message": e.to_string()})),
            )
                .into_response(),
        };
    }

    let Some(thread_id) = request.thread_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"ok": false, "error": "invalid_input", "message": "prompt_id or thread_id is required"})),
        )
            .into_response();
    };

    let (emitter, rx) = FrameEmitter::channel(request.session_id);
    let app = state.clone();
    let decision = request.decision;
    tokio::spawn(async move {
        if let Err(e) = app.workflows.resume(&thread_id, decision, &emitter).await {
            emitter.emit_error(&e).await;
        }
        emitter.close();
    });

    frame_stream_response(rx, state.config.keep_alive)
}

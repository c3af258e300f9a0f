//! Receiver → SSE response adapter.
//!
//! Serializes each frame as one `data:` event; keep-alive comments flow at
//! the configured interval while the channel is open.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use stream_frame::StreamFrame;

pub(crate) fn frame_stream_response(
    rx: mpsc::Receiver<StreamFrame>,
    keep_alive: Duration,
) -> Response {
    let stream = ReceiverStream::new(rx).filter_map(|frame| match serde_json::to_string(&frame) {
        Ok(json) => Some(Ok::<Event, Infallible>(Event::default().data(json))),
        Err(e) => {
            tracing::warn!(error = %e, "dropping unserializable frame");
            None
        }
    });
    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(keep_alive).text("keep-alive"))
        .into_response()
}

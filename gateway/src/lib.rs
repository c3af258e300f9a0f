//! HTTP gateway for the coagent core (axum + SSE).
//!
//! Routes: `POST /agui` (SSE request stream), `POST /agui/resume` (approval
//! and interrupt resolution), `GET /health`, `GET /monitoring/*`.
//!
//! **Public API**: [`GatewayBuilder`], [`run_serve`], [`run_serve_on_listener`],
//! [`spawn_sweepers`].

mod agui;
mod app;
mod health;
mod monitoring;
mod resume;
mod sse;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

pub use app::{spawn_sweepers, AppState, GatewayBuilder};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Serves on an existing listener. Tests bind `127.0.0.1:0` and pass the
/// listener here, with an optional shutdown channel for a clean exit.
pub async fn run_serve_on_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Option<oneshot::Receiver<()>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("coagent gateway listening on http://{}", addr);

    let router = app::router(state);
    match shutdown {
        Some(rx) => {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await?;
        }
        None => axum::serve(listener, router).await?,
    }
    Ok(())
}

/// Binds and serves. `addr` defaults to `127.0.0.1:8080`.
pub async fn run_serve(
    addr: Option<&str>,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, state, None).await
}

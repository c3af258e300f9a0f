//! Gateway binary: env-configured startup.

use std::sync::Arc;

use coagent::config::GatewayConfig;
use coagent::erp::HttpTransport;
use coagent::llm::ChatOpenAI;
use coagent::memory::{Checkpointer, MemorySaver, SqliteCheckpointStore};

use gateway::{run_serve, spawn_sweepers, GatewayBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env();

    let model =
        std::env::var("COAGENT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let llm = Arc::new(ChatOpenAI::new(model));

    let erp_base =
        std::env::var("ERP_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    let erp_token = std::env::var("ERP_SESSION_TOKEN").unwrap_or_default();
    let transport = Arc::new(HttpTransport::new(erp_base, erp_token, config.erp_timeout)?);

    let checkpointer: Arc<dyn Checkpointer> = match std::env::var("CHECKPOINT_DB") {
        Ok(path) => Arc::new(SqliteCheckpointStore::open(path)?),
        Err(_) => Arc::new(MemorySaver::new()),
    };

    let mut builder = GatewayBuilder::new(llm, transport)
        .with_config(config)
        .with_checkpointer(checkpointer);
    if let Ok(dir) = std::env::var("SUBAGENT_DIR") {
        builder = builder.with_subagent_dir(dir.into());
    }
    let state = builder.build()?;

    let _sweepers = spawn_sweepers(state.clone());

    let addr = std::env::var("GATEWAY_ADDR").ok();
    run_serve(addr.as_deref(), state).await
}

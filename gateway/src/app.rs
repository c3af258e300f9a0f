//! App state, builder, and router.

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use dashmap::DashMap;

use coagent::agent::AgentLoop;
use coagent::approval::PendingApprovals;
use coagent::config::GatewayConfig;
use coagent::erp::{ErpClient, ErpTransport};
use coagent::llm::{LlmClient, UsageTracker};
use coagent::memory::{Checkpointer, MemorySaver};
use coagent::orchestrator::{Orchestrator, SubAgentRegistry};
use coagent::session::SessionStore;
use coagent::tools::{register_erp_tools, ToolRegistry};
use coagent::workflow::{WorkflowBridgeTool, WorkflowRegistry, WorkflowRuntime};
use coagent::GatewayError;

use super::{agui, health, monitoring, resume};

/// Everything the handlers share. Built once at startup.
pub struct AppState {
    pub config: GatewayConfig,
    pub sessions: Arc<SessionStore>,
    pub registry: Arc<ToolRegistry>,
    pub subagents: Arc<SubAgentRegistry>,
    pub workflows: Arc<WorkflowRuntime>,
    pub pending: Arc<PendingApprovals>,
    pub llm: Arc<dyn LlmClient>,
    pub transport: Arc<dyn ErpTransport>,
    pub usage: Arc<UsageTracker>,
    /// One ERP adapter per session (its bucket and idempotency cache are
    /// session-scoped). Cleaned up alongside session eviction.
    pub adapters: DashMap<String, Arc<ErpClient>>,
}

impl AppState {
    /// The session's ERP adapter, created on first use.
    pub fn adapter_for(&self, session_id: &str) -> Arc<ErpClient> {
        self.adapters
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(ErpClient::new(self.transport.clone(), &self.config))
            })
            .clone()
    }

    pub fn agent_loop(&self) -> Arc<AgentLoop> {
        Arc::new(AgentLoop::new(
            self.llm.clone(),
            self.registry.clone(),
            self.pending.clone(),
            self.usage.clone(),
            self.config.max_iterations,
        ))
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.llm.clone(),
            self.subagents.clone(),
            self.agent_loop(),
            self.usage.clone(),
        )
    }
}

/// Assembles an [`AppState`] from its injectable edges (LLM client, ERP
/// transport, checkpoint store). Tests inject mocks here.
pub struct GatewayBuilder {
    config: GatewayConfig,
    llm: Arc<dyn LlmClient>,
    transport: Arc<dyn ErpTransport>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    subagent_dir: Option<PathBuf>,
}

impl GatewayBuilder {
    pub fn new(llm: Arc<dyn LlmClient>, transport: Arc<dyn ErpTransport>) -> Self {
        Self {
            config: GatewayConfig::default(),
            llm,
            transport,
            checkpointer: None,
            subagent_dir: None,
        }
    }

    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    pub fn with_subagent_dir(mut self, dir: PathBuf) -> Self {
        self.subagent_dir = Some(dir);
        self
    }

    pub fn build(self) -> Result<Arc<AppState>, GatewayError> {
        let checkpointer = self
            .checkpointer
            .unwrap_or_else(|| Arc::new(MemorySaver::new()));
        let workflow_registry = WorkflowRegistry::with_builtin_graphs()
            .map_err(|e| GatewayError::Internal(format!("workflow registration failed: {}", e)))?;
        let workflows = Arc::new(WorkflowRuntime::new(
            Arc::new(workflow_registry),
            checkpointer,
        ));

        let mut registry = ToolRegistry::new();
        register_erp_tools(&mut registry);
        registry.register(Arc::new(WorkflowBridgeTool::new(workflows.clone())));

        let mut subagents = SubAgentRegistry::with_defaults();
        if let Some(dir) = &self.subagent_dir {
            match subagents.load_dir(dir) {
                Ok(loaded) => tracing::info!(dir = %dir.display(), loaded, "loaded sub-agents"),
                Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "sub-agent dir unreadable"),
            }
        }

        Ok(Arc::new(AppState {
            sessions: Arc::new(SessionStore::new(self.config.session_idle_timeout)),
            registry: Arc::new(registry),
            subagents: Arc::new(subagents),
            workflows,
            pending: Arc::new(PendingApprovals::new()),
            llm: self.llm,
            transport: self.transport,
            usage: Arc::new(UsageTracker::new()),
            adapters: DashMap::new(),
            config: self.config,
        }))
    }
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/agui", post(agui::handle_agui))
        .route("/agui/resume", post(resume::handle_resume))
        .route("/health", get(health::handle_health))
        .route("/monitoring/costs", get(monitoring::handle_costs))
        .route(
            "/monitoring/circuit-breaker",
            get(monitoring::handle_circuit_breaker),
        )
        .with_state(state)
}

/// Periodic housekeeping: session sweep (with resolver and adapter GC) and
/// workflow checkpoint TTL.
pub fn spawn_sweepers(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.session_sweep_interval);
        loop {
            interval.tick().await;
            let evicted = state.sessions.sweep().await;
            for session_id in &evicted {
                let dropped = state.pending.gc_session(session_id);
                state.adapters.remove(session_id);
                if dropped > 0 {
                    tracing::info!(session_id = %session_id, dropped, "dropped pending approvals");
                }
            }
            state.workflows.sweep(state.config.workflow_state_ttl).await;
        }
    })
}

//! Tool registry: typed, named capabilities callable by the LLM.
//!
//! Each tool carries a [`ToolSpec`] (name, description, JSON-Schema input,
//! optional industry tag). The registry filters by a session's enabled
//! industries, validates inputs against the schema before execution, and
//! exposes the risk classifier.

mod erp_tools;
mod preview;
mod schema;

pub use erp_tools::register_erp_tools;
pub use preview::preview_for;
pub use schema::validate_input;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::erp::ErpClient;
use crate::error::GatewayError;
use crate::risk::{self, RiskAssessment, RiskThresholds};
use crate::session::CoagentSession;
use crate::stream::FrameEmitter;

/// Tool specification: the single source of truth for both input validation
/// and the LLM-facing tool definition.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON-Schema object validating the tool input.
    pub input_schema: Value,
    /// Industry tag; `None` marks a common tool visible to every session.
    pub industry: Option<String>,
}

/// Per-call context handed to tools. The emitter is the caller's channel so
/// long-running tools (the workflow bridge) stream into the same stream.
#[derive(Clone)]
pub struct ToolContext {
    pub session: Arc<CoagentSession>,
    pub erp: Arc<ErpClient>,
    pub emitter: FrameEmitter,
}

/// One callable capability.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn call(&self, input: Value, ctx: &ToolContext) -> Result<Value, GatewayError>;
}

impl std::fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("spec", &self.spec()).finish()
    }
}

/// Name → tool map, loaded at startup and immutable at runtime.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    thresholds: RiskThresholds,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            thresholds: RiskThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.insert(tool.spec().name, tool);
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn visible(spec: &ToolSpec, enabled_industries: &HashSet<String>) -> bool {
        match &spec.industry {
            None => true,
            Some(industry) => enabled_industries.contains(industry),
        }
    }

    /// Specs visible to a session: common tools plus those of its enabled
    /// industries, sorted by name for deterministic prompts.
    pub fn list(&self, enabled_industries: &HashSet<String>) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|t| t.spec())
            .filter(|spec| Self::visible(spec, enabled_industries))
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Resolves a tool through the session's industry filter.
    pub fn get(
        &self,
        name: &str,
        enabled_industries: &HashSet<String>,
    ) -> Result<Arc<dyn Tool>, GatewayError> {
        self.tools
            .get(name)
            .filter(|t| Self::visible(&t.spec(), enabled_industries))
            .cloned()
            .ok_or_else(|| GatewayError::UnknownTool(name.to_string()))
    }

    /// Validates the input against the tool's schema, then executes.
    pub async fn execute(
        &self,
        name: &str,
        input: Value,
        ctx: &ToolContext,
    ) -> Result<Value, GatewayError> {
        let tool = self.get(name, &ctx.session.enabled_industries)?;
        validate_input(&tool.spec().input_schema, &input)?;
        tool.call(input, ctx).await
    }

    /// Risk assessment for a proposed invocation. The document state, when
    /// the caller knows it, rides along in the input as `document_state`.
    pub fn assess_risk(&self, name: &str, input: &Value) -> RiskAssessment {
        let document_state = input
            .get("document_state")
            .and_then(Value::as_str);
        risk::assess(name, input, document_state, &self.thresholds)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Orchestrator: classifies the initial user message and routes it.
//!
//! A lightweight classification call returns a structured verdict
//! (`direct`, `delegate`, `multi_industry`, `deep_research`); routing either
//! runs the agent loop (with the default or a sub-agent's prompt/toolset),
//! fans out to sub-agents in parallel and synthesizes, or runs a scoped
//! research pass. Malformed verdicts fall back to `direct`.

mod prompts;
mod subagent;

pub use prompts::{CLASSIFICATION_PROMPT, SYNTHESIS_PROMPT};
pub use subagent::{parse_subagent_doc, SubAgentConfig, SubAgentRegistry};

use std::sync::Arc;

use serde::Deserialize;

use crate::agent::{AgentLoop, DEFAULT_SYSTEM_PROMPT};
use crate::error::GatewayError;
use crate::llm::{LlmClient, UsageTracker};
use crate::message::Message;
use crate::tools::ToolContext;

/// How a request is routed after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    Direct,
    Delegate,
    MultiIndustry,
    DeepResearch,
}

/// The classification verdict.
#[derive(Debug, Clone, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default = "default_complexity")]
    pub complexity: String,
    pub routing_decision: RoutingDecision,
    #[serde(default)]
    pub requires_subagents: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

fn default_complexity() -> String {
    "simple".to_string()
}

impl Classification {
    pub fn direct() -> Self {
        Self {
            industry: None,
            complexity: default_complexity(),
            routing_decision: RoutingDecision::Direct,
            requires_subagents: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Extracts the JSON verdict from a model reply. Anything unparseable
/// degrades to `direct`.
pub fn parse_classification(text: &str) -> Classification {
    let Some(start) = text.find('{') else {
        return Classification::direct();
    };
    let Some(end) = text.rfind('}') else {
        return Classification::direct();
    };
    serde_json::from_str(&text[start..=end]).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "classification parse failed, routing direct");
        Classification::direct()
    })
}

/// Scope hints for deep research, extracted by keyword.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearchScope {
    pub time_period: Option<String>,
    pub modules: Vec<String>,
}

const TIME_KEYWORDS: &[&str] = &[
    "today",
    "yesterday",
    "this week",
    "last week",
    "this month",
    "last month",
    "this quarter",
    "last quarter",
    "this year",
    "last year",
];

const MODULE_KEYWORDS: &[&str] = &[
    "sales",
    "purchasing",
    "inventory",
    "accounting",
    "hr",
    "manufacturing",
    "crm",
    "hotel",
    "restaurant",
    "retail",
];

/// Pulls time-period and module keywords out of the request.
pub fn extract_scope(message: &str) -> ResearchScope {
    let lower = message.to_lowercase();
    ResearchScope {
        time_period: TIME_KEYWORDS
            .iter()
            .find(|k| lower.contains(*k))
            .map(|k| k.to_string()),
        modules: MODULE_KEYWORDS
            .iter()
            .filter(|k| lower.contains(*k))
            .map(|k| k.to_string())
            .collect(),
    }
}

/// Top-level router for one user message.
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    subagents: Arc<SubAgentRegistry>,
    agent: Arc<AgentLoop>,
    usage: Arc<UsageTracker>,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        subagents: Arc<SubAgentRegistry>,
        agent: Arc<AgentLoop>,
        usage: Arc<UsageTracker>,
    ) -> Self {
        Self {
            llm,
            subagents,
            agent,
            usage,
        }
    }

    /// One classification call; failures and malformed output route direct.
    pub async fn classify(&self, message: &str) -> Classification {
        let messages = [
            Message::system(CLASSIFICATION_PROMPT),
            Message::user(message),
        ];
        match self.llm.invoke(&messages, &[]).await {
            Ok(turn) => {
                if let Some(usage) = &turn.usage {
                    self.usage.record(usage);
                }
                parse_classification(&turn.content)
            }
            Err(e) => {
                tracing::warn!(error = %e, "classification call failed, routing direct");
                Classification::direct()
            }
        }
    }

    /// One-shot sub-agent completion: its system prompt + the user message.
    async fn invoke_subagent(
        &self,
        config: &SubAgentConfig,
        message: &str,
    ) -> Result<String, GatewayError> {
        let messages = [
            Message::system(&config.system_prompt),
            Message::user(message),
        ];
        let turn = self.llm.invoke(&messages, &[]).await?;
        if let Some(usage) = &turn.usage {
            self.usage.record(usage);
        }
        Ok(turn.content)
    }

    async fn run_delegate(
        &self,
        config: &SubAgentConfig,
        message: &str,
        ctx: &ToolContext,
    ) -> Result<(), GatewayError> {
        let filter = if config.tools.is_empty() {
            None
        } else {
            Some(config.tools.as_slice())
        };
        self.agent
            .run_turn(message, &config.system_prompt, filter, ctx)
            .await
    }

    async fn run_multi_industry(
        &self,
        classification: &Classification,
        message: &str,
        ctx: &ToolContext,
    ) -> Result<(), GatewayError> {
        let configs: Vec<Arc<SubAgentConfig>> = classification
            .requires_subagents
            .iter()
            .filter_map(|name| self.subagents.get(name))
            .collect();
        if configs.is_empty() {
            return self
                .agent
                .run_turn(message, DEFAULT_SYSTEM_PROMPT, None, ctx)
                .await;
        }

        let answers = futures::future::join_all(
            configs.iter().map(|config| self.invoke_subagent(config, message)),
        )
        .await;

        let mut sources = Vec::new();
        for (config, answer) in configs.iter().zip(answers) {
            match answer {
                Ok(text) => sources.push(serde_json::json!({
                    "agent": config.name,
                    "answer": text,
                })),
                Err(e) => {
                    tracing::warn!(agent = %config.name, error = %e, "sub-agent failed")
                }
            }
        }

        let synthesis_input = serde_json::json!({
            "strategy": "synthesis",
            "question": message,
            "sources": sources,
        });
        let messages = [
            Message::system(SYNTHESIS_PROMPT),
            Message::user(synthesis_input.to_string()),
        ];
        let turn = self.llm.invoke(&messages, &[]).await?;
        if let Some(usage) = &turn.usage {
            self.usage.record(usage);
        }

        ctx.session
            .push_messages([Message::user(message), Message::assistant(turn.content.clone())])
            .await;
        ctx.emitter.emit_message(&turn.content).await;
        ctx.emitter.emit_status("completed", "synthesis finished").await;
        Ok(())
    }

    async fn run_deep_research(
        &self,
        message: &str,
        ctx: &ToolContext,
    ) -> Result<(), GatewayError> {
        let Some(config) = self.subagents.get("research") else {
            return self
                .agent
                .run_turn(message, DEFAULT_SYSTEM_PROMPT, None, ctx)
                .await;
        };
        let scope = extract_scope(message);
        let scoped = format!(
            "{}\n\nScope: time period = {}; modules = {}",
            message,
            scope.time_period.as_deref().unwrap_or("unspecified"),
            if scope.modules.is_empty() {
                "all".to_string()
            } else {
                scope.modules.join(", ")
            }
        );
        let summary = self.invoke_subagent(&config, &scoped).await?;
        ctx.session
            .push_messages([Message::user(message), Message::assistant(summary.clone())])
            .await;
        ctx.emitter.emit_message(&summary).await;
        ctx.emitter
            .emit_status("completed", "research summary delivered")
            .await;
        Ok(())
    }

    /// Classifies and routes one user message end to end.
    pub async fn handle(&self, message: &str, ctx: &ToolContext) -> Result<(), GatewayError> {
        let classification = self.classify(message).await;
        tracing::info!(
            routing = ?classification.routing_decision,
            industry = ?classification.industry,
            confidence = classification.confidence,
            "request classified"
        );

        match classification.routing_decision {
            RoutingDecision::Direct => {
                self.agent
                    .run_turn(message, DEFAULT_SYSTEM_PROMPT, None, ctx)
                    .await
            }
            RoutingDecision::Delegate => {
                match classification
                    .requires_subagents
                    .first()
                    .and_then(|name| self.subagents.get(name))
                {
                    Some(config) => self.run_delegate(&config, message, ctx).await,
                    None => {
                        self.agent
                            .run_turn(message, DEFAULT_SYSTEM_PROMPT, None, ctx)
                            .await
                    }
                }
            }
            RoutingDecision::MultiIndustry => {
                self.run_multi_industry(&classification, message, ctx).await
            }
            RoutingDecision::DeepResearch => self.run_deep_research(message, ctx).await,
        }
    }
}

//! LLM client abstraction.
//!
//! One internal interface: `invoke(messages, tools)` returning assistant text
//! plus structured tool invocations, with a streaming variant that feeds
//! token chunks through a channel. Tool schemas are plain JSON-Schema objects
//! ([`crate::tools::ToolSpec`]); providers project them to their wire format
//! with a pure function. Implementations: [`ChatOpenAI`] (real API),
//! [`MockLlm`] (scripted, for tests).

mod mock;
mod openai;

pub use mock::MockLlm;
pub use openai::ChatOpenAI;

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::GatewayError;
use crate::message::Message;
use crate::tools::ToolSpec;

/// One token chunk of streaming assistant text.
#[derive(Clone, Debug)]
pub struct MessageChunk {
    pub content: String,
}

/// Token usage for one LLM call.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A structured tool invocation produced by the model.
#[derive(Clone, Debug)]
pub struct ToolInvocation {
    /// Provider call id, when one was assigned.
    pub id: Option<String>,
    pub name: String,
    /// Parsed arguments. Providers that stream argument text parse it here;
    /// unparseable arguments degrade to an empty object.
    pub arguments: Value,
}

/// One completed model turn: text, tool invocations, usage.
#[derive(Clone, Debug, Default)]
pub struct LlmTurn {
    pub content: String,
    pub tool_calls: Vec<ToolInvocation>,
    pub usage: Option<LlmUsage>,
}

impl LlmTurn {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// LLM client: messages + tool schemas in, one turn out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One completion turn. `tools` enables the tool-use protocol; the model
    /// may answer with text, tool invocations, or both.
    async fn invoke(&self, messages: &[Message], tools: &[ToolSpec])
        -> Result<LlmTurn, GatewayError>;

    /// Streaming variant. When `chunk_tx` is `Some`, implementations send
    /// text deltas through the channel as they arrive and still return the
    /// complete turn. The default delegates to `invoke` and sends the full
    /// content as one chunk.
    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        chunk_tx: Option<mpsc::Sender<MessageChunk>>,
    ) -> Result<LlmTurn, GatewayError> {
        let turn = self.invoke(messages, tools).await?;
        if let Some(tx) = chunk_tx {
            if !turn.content.is_empty() {
                let _ = tx
                    .send(MessageChunk {
                        content: turn.content.clone(),
                    })
                    .await;
            }
        }
        Ok(turn)
    }
}

/// Process-wide token accounting, exposed via the monitoring surface.
#[derive(Default)]
pub struct UsageTracker {
    totals: Mutex<LlmUsage>,
    calls: Mutex<u64>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, usage: &LlmUsage) {
        if let Ok(mut totals) = self.totals.lock() {
            totals.prompt_tokens += usage.prompt_tokens;
            totals.completion_tokens += usage.completion_tokens;
            totals.total_tokens += usage.total_tokens;
        }
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
    }

    pub fn totals(&self) -> (LlmUsage, u64) {
        let totals = self.totals.lock().map(|g| g.clone()).unwrap_or_default();
        let calls = self.calls.lock().map(|g| *g).unwrap_or(0);
        (totals, calls)
    }
}

//! Scripted LLM client for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::message::Message;
use crate::tools::ToolSpec;

use super::{LlmClient, LlmTurn};

/// Replays a fixed sequence of turns; once the script is exhausted it answers
/// with plain text. Records the message lists it was invoked with so tests
/// can assert on conversation shape.
pub struct MockLlm {
    script: Mutex<VecDeque<LlmTurn>>,
    exhausted_reply: String,
    invocations: Mutex<Vec<Vec<Message>>>,
}

impl MockLlm {
    pub fn new(turns: Vec<LlmTurn>) -> Self {
        Self {
            script: Mutex::new(turns.into()),
            exhausted_reply: "Done.".to_string(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Reply used after the script runs out.
    pub fn with_exhausted_reply(mut self, reply: impl Into<String>) -> Self {
        self.exhausted_reply = reply.into();
        self
    }

    /// Message lists seen so far, one entry per invoke.
    pub fn invocations(&self) -> Vec<Vec<Message>> {
        self.invocations.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(
        &self,
        messages: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<LlmTurn, GatewayError> {
        if let Ok(mut invocations) = self.invocations.lock() {
            invocations.push(messages.to_vec());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        Ok(next.unwrap_or_else(|| LlmTurn::text(self.exhausted_reply.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolInvocation;

    /// **Scenario**: Scripted turns replay in order, then the exhausted reply.
    #[tokio::test]
    async fn replays_script_then_fallback() {
        let llm = MockLlm::new(vec![
            LlmTurn {
                content: String::new(),
                tool_calls: vec![ToolInvocation {
                    id: Some("call-1".into()),
                    name: "get_doc".into(),
                    arguments: serde_json::json!({"doctype": "Room", "name": "101"}),
                }],
                usage: None,
            },
            LlmTurn::text("Room 101 is free."),
        ])
        .with_exhausted_reply("Nothing left.");

        let first = llm.invoke(&[Message::user("hi")], &[]).await.unwrap();
        assert_eq!(first.tool_calls.len(), 1);
        let second = llm.invoke(&[], &[]).await.unwrap();
        assert_eq!(second.content, "Room 101 is free.");
        let third = llm.invoke(&[], &[]).await.unwrap();
        assert_eq!(third.content, "Nothing left.");
        assert_eq!(llm.invocations().len(), 3);
    }
}

//! OpenAI Chat Completions client implementing `LlmClient`.
//!
//! Uses the Chat Completions API with the tool-use protocol. Requires
//! `OPENAI_API_KEY` (or explicit config). Tool schemas are projected from
//! [`ToolSpec`] to the wire format by [`project_tools`]; streaming reads
//! `choices[0].delta.content` for incremental text and accumulates
//! `delta.tool_calls` by index.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionMessageToolCalls, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage, ChatCompletionTool,
        ChatCompletionTools, CreateChatCompletionRequestArgs, FunctionObject,
    },
    Client,
};

use crate::error::GatewayError;
use crate::message::Message;
use crate::tools::ToolSpec;

use super::{LlmClient, LlmTurn, LlmUsage, MessageChunk, ToolInvocation};

/// Projects internal tool specs to the Chat Completions tool format. Pure;
/// the single source of truth stays the `ToolSpec.input_schema` object.
pub fn project_tools(tools: &[ToolSpec]) -> Vec<ChatCompletionTools> {
    tools
        .iter()
        .map(|t| {
            ChatCompletionTools::Function(ChatCompletionTool {
                function: FunctionObject {
                    name: t.name.clone(),
                    description: Some(t.description.clone()),
                    parameters: Some(t.input_schema.clone()),
                    ..Default::default()
                },
            })
        })
        .collect()
}

/// Parses a tool-call arguments string. Malformed JSON degrades to an empty
/// object so one bad call does not kill the turn.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, arguments = %raw, "tool arguments JSON parse failed, using empty object");
            serde_json::json!({})
        }
    }
}

/// OpenAI Chat Completions client.
pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
}

impl ChatOpenAI {
    /// Default config: API key from `OPENAI_API_KEY`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            temperature: None,
        }
    }

    /// Custom config (API key, base URL).
    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn messages_to_request(messages: &[Message]) -> Vec<ChatCompletionRequestMessage> {
        messages
            .iter()
            .map(|m| match m {
                Message::System(s) => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(s.as_str()),
                ),
                Message::User(s) => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(s.as_str()),
                ),
                Message::Assistant(s) => {
                    ChatCompletionRequestMessage::Assistant((s.as_str()).into())
                }
            })
            .collect()
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        stream: bool,
    ) -> Result<async_openai::types::chat::CreateChatCompletionRequest, GatewayError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(Self::messages_to_request(messages));
        if stream {
            args.stream(true);
        }
        if !tools.is_empty() {
            args.tools(project_tools(tools));
        }
        if let Some(t) = self.temperature {
            args.temperature(t);
        }
        args.build()
            .map_err(|e| GatewayError::Internal(format!("chat request build failed: {}", e)))
    }

    fn map_api_error(e: async_openai::error::OpenAIError) -> GatewayError {
        let text = e.to_string();
        if text.contains("429") || text.to_lowercase().contains("rate limit") {
            GatewayError::RateLimitedUpstream { retry_after: None }
        } else {
            GatewayError::Internal(format!("llm api error: {}", text))
        }
    }
}

#[async_trait]
impl LlmClient for ChatOpenAI {
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<LlmTurn, GatewayError> {
        let request = self.build_request(messages, tools, false)?;
        debug!(
            model = %self.model,
            message_count = messages.len(),
            tools_count = tools.len(),
            "chat create"
        );

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(Self::map_api_error)?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Internal("llm returned no choices".into()))?;

        let msg = choice.message;
        let content = msg.content.unwrap_or_default();
        let tool_calls: Vec<ToolInvocation> = msg
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tc| {
                if let ChatCompletionMessageToolCalls::Function(f) = tc {
                    Some(ToolInvocation {
                        id: Some(f.id),
                        name: f.function.name,
                        arguments: parse_arguments(&f.function.arguments),
                    })
                } else {
                    None
                }
            })
            .collect();

        let usage = response.usage.map(|u| LlmUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(LlmTurn {
            content,
            tool_calls,
            usage,
        })
    }

    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        chunk_tx: Option<mpsc::Sender<MessageChunk>>,
    ) -> Result<LlmTurn, GatewayError> {
        let Some(chunk_tx) = chunk_tx else {
            return self.invoke(messages, tools).await;
        };

        let request = self.build_request(messages, tools, true)?;
        debug!(
            model = %self.model,
            message_count = messages.len(),
            tools_count = tools.len(),
            "chat create_stream"
        );

        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(Self::map_api_error)?;

        let mut full_content = String::new();
        // Accumulator: index -> (id, name, arguments text).
        let mut tool_call_map: std::collections::HashMap<u32, (String, String, String)> =
            std::collections::HashMap::new();
        let mut usage: Option<LlmUsage> = None;

        while let Some(result) = stream.next().await {
            let response = result.map_err(Self::map_api_error)?;

            if let Some(ref u) = response.usage {
                usage = Some(LlmUsage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                });
            }

            for choice in response.choices {
                let delta = &choice.delta;
                if let Some(ref content) = delta.content {
                    if !content.is_empty() {
                        full_content.push_str(content);
                        let _ = chunk_tx
                            .send(MessageChunk {
                                content: content.clone(),
                            })
                            .await;
                    }
                }
                if let Some(ref tool_calls) = delta.tool_calls {
                    for tc in tool_calls {
                        let entry = tool_call_map.entry(tc.index).or_insert_with(|| {
                            (tc.id.clone().unwrap_or_default(), String::new(), String::new())
                        });
                        if let Some(ref id) = tc.id {
                            if !id.is_empty() {
                                entry.0 = id.clone();
                            }
                        }
                        if let Some(ref func) = tc.function {
                            if let Some(ref name) = func.name {
                                entry.1.push_str(name);
                            }
                            if let Some(ref args) = func.arguments {
                                entry.2.push_str(args);
                            }
                        }
                    }
                }
            }
        }

        let mut indexed: Vec<_> = tool_call_map.into_iter().collect();
        indexed.sort_by_key(|(index, _)| *index);
        let tool_calls = indexed
            .into_iter()
            .map(|(_, (id, name, arguments))| ToolInvocation {
                id: if id.is_empty() { None } else { Some(id) },
                name,
                arguments: parse_arguments(&arguments),
            })
            .collect();

        Ok(LlmTurn {
            content: full_content,
            tool_calls,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    /// **Scenario**: Tool projection keeps the schema object as the function
    /// parameters, untouched.
    #[test]
    fn project_tools_preserves_schema() {
        let spec = ToolSpec {
            name: "create_doc".into(),
            description: "Create an ERP document".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["doctype", "data"],
                "properties": {
                    "doctype": {"type": "string"},
                    "data": {"type": "object"}
                }
            }),
            industry: None,
        };
        let projected = project_tools(&[spec.clone()]);
        assert_eq!(projected.len(), 1);
        let ChatCompletionTools::Function(f) = &projected[0] else {
            panic!("expected a function tool");
        };
        assert_eq!(f.function.name, "create_doc");
        assert_eq!(f.function.parameters, Some(spec.input_schema));
    }

    /// **Scenario**: Malformed arguments degrade to an empty object.
    #[test]
    fn parse_arguments_tolerates_garbage() {
        assert_eq!(parse_arguments(""), serde_json::json!({}));
        assert_eq!(parse_arguments("{not json"), serde_json::json!({}));
        assert_eq!(
            parse_arguments(r#"{"doctype": "Room"}"#),
            serde_json::json!({"doctype": "Room"})
        );
    }

    /// **Scenario**: invoke against an unreachable base returns an error
    /// (no real API key needed).
    #[tokio::test]
    async fn invoke_with_unreachable_base_returns_error() {
        let config = OpenAIConfig::new()
            .with_api_key("test-key")
            .with_api_base("https://127.0.0.1:1");
        let client = ChatOpenAI::with_config(config, "gpt-4o-mini");
        let result = client.invoke(&[Message::user("Hello")], &[]).await;
        assert!(result.is_err());
    }

    /// **Scenario**: invoke_stream with no channel delegates to invoke.
    #[tokio::test]
    async fn invoke_stream_none_channel_delegates() {
        let config = OpenAIConfig::new()
            .with_api_key("test-key")
            .with_api_base("https://127.0.0.1:1");
        let client = ChatOpenAI::with_config(config, "gpt-4o-mini");
        let result = client.invoke_stream(&[Message::user("Hi")], &[], None).await;
        assert!(result.is_err());
    }
}

//! OpenAI-Compatible LLM Provider
//!
//! Implementation of `LlmProvider` for the chat completions protocol with
//! function calling. Works against OpenAI itself and any compatible
//! endpoint (Together, Groq, local gateways).

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{DeltaCallback, LlmProvider, LlmResponse, StopReason, TokenUsage},
    tool::{ToolCall, ToolDefinition},
};
use async_trait::async_trait;
use serde_json::Value;

/// OpenAI provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// API key sent as a bearer token
    pub api_key: String,

    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: String,

    /// Base URL of the endpoint
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com".into(),
            timeout_secs: 120,
        }
    }
}

impl OpenAiConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AgentError::Config("OPENAI_API_KEY is not set".into()))?;
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com".into());

        Ok(Self {
            api_key,
            model,
            base_url,
            ..Default::default()
        })
    }
}

/// OpenAI-compatible chat completions provider
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create from configuration
    pub fn from_config(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OpenAiConfig::from_env()?)
    }

    /// Convert internal messages to the wire format
    fn convert_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                serde_json::json!({ "role": role, "content": m.content })
            })
            .collect()
    }

    /// Convert tool definitions to function-calling declarations
    fn convert_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect()
    }

    fn build_request_body(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": Self::convert_messages(messages),
        });

        if !tools.is_empty() {
            body["tools"] = Value::Array(Self::convert_tools(tools));
        }

        body
    }

    /// Extract the agent-facing response from a completion payload
    fn convert_response(parsed: &Value) -> LlmResponse {
        let choice = parsed
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first());
        let message = choice.and_then(|c| c.get("message"));

        let content = message
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let tool_calls: Vec<ToolCall> = message
            .and_then(|m| m.get("tool_calls"))
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|tc| {
                        let function = tc.get("function")?;
                        let name = function.get("name").and_then(Value::as_str)?;
                        // Arguments arrive as a JSON-encoded string; a
                        // null or unparsable payload becomes an empty
                        // object so validation can report it.
                        let arguments = function
                            .get("arguments")
                            .and_then(Value::as_str)
                            .and_then(|s| serde_json::from_str(s).ok())
                            .unwrap_or_else(|| serde_json::json!({}));

                        Some(ToolCall {
                            id: tc
                                .get("id")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            name: name.to_string(),
                            arguments,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let finish_reason = choice
            .and_then(|c| c.get("finish_reason"))
            .and_then(Value::as_str);

        let stop_reason = match finish_reason {
            Some("tool_calls") => StopReason::ToolUse,
            Some("length") => StopReason::MaxTokens,
            Some("stop") => StopReason::EndTurn,
            _ if !tool_calls.is_empty() => StopReason::ToolUse,
            _ => StopReason::EndTurn,
        };

        let usage = parsed.get("usage").map(|u| TokenUsage {
            input_tokens: u
                .get("prompt_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
            output_tokens: u
                .get("completion_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
        });

        LlmResponse {
            content,
            tool_calls,
            stop_reason,
            usage,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        on_delta: Option<DeltaCallback>,
    ) -> Result<LlmResponse> {
        let body = self.build_request_body(messages, tools);
        let url = format!("{}/v1/chat/completions", self.config.base_url);

        tracing::debug!(model = %self.config.model, tools = tools.len(), "calling chat completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Unknown {
                message: format!("chat completions request failed: {}", e),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AgentError::from_provider_status(
                status.as_u16(),
                format!("chat completions HTTP {}: {}", status.as_u16(), detail),
                None,
            ));
        }

        let parsed: Value = response.json().await.map_err(|e| AgentError::Unknown {
            message: format!("malformed chat completions payload: {}", e),
            source: Some(Box::new(e)),
        })?;

        let llm_response = Self::convert_response(&parsed);

        // Non-streaming backend: the whole turn arrives as one delta.
        if let (Some(cb), Some(content)) = (&on_delta, llm_response.content.as_deref()) {
            if !content.is_empty() {
                cb(content);
            }
        }

        Ok(llm_response)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(payload: Value) -> LlmResponse {
        OpenAiProvider::convert_response(&payload)
    }

    #[test]
    fn converts_plain_text_turn() {
        let response = completion(serde_json::json!({
            "choices": [{
                "message": { "content": "Hello!" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 4 }
        }));

        assert_eq!(response.content.as_deref(), Some("Hello!"));
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.unwrap().input_tokens, 12);
    }

    #[test]
    fn converts_tool_call_turn() {
        let response = completion(serde_json::json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "search",
                            "arguments": "{\"query\": \"rust\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }));

        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "search");
        assert_eq!(
            response.tool_calls[0].arguments,
            serde_json::json!({ "query": "rust" })
        );
    }

    #[test]
    fn unparsable_arguments_degrade_to_empty_object() {
        let response = completion(serde_json::json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "id": "call_1",
                        "function": { "name": "search", "arguments": "not json" }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }));

        assert_eq!(response.tool_calls[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn missing_finish_reason_with_calls_is_tool_use() {
        let response = completion(serde_json::json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "id": "c", "function": { "name": "f", "arguments": "{}" }
                    }]
                }
            }]
        }));

        assert_eq!(response.stop_reason, StopReason::ToolUse);
    }

    #[test]
    fn builds_wire_messages_and_tools() {
        let config = OpenAiConfig {
            api_key: "k".into(),
            ..Default::default()
        };
        let provider = OpenAiProvider::from_config(config).unwrap();

        let messages = vec![Message::system("be helpful"), Message::user("hi")];
        let tools = vec![ToolDefinition {
            name: "ping".into(),
            description: "Reply with pong".into(),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }];

        let body = provider.build_request_body(&messages, &tools);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["tools"][0]["function"]["name"], "ping");
    }
}

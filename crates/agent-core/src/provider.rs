//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all LLM providers (OpenAI-compatible,
//! Anthropic, local inference, etc.) allowing the agent loop to work with
//! any backend without code changes. A vendor is one `chat` capability,
//! nothing more; new vendors are new implementations, never subclasses.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;
use crate::tool::{ToolCall, ToolDefinition};

/// Why the provider ended a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Final answer, nothing more to do
    EndTurn,
    /// The model wants tool results before continuing
    ToolUse,
    /// Output hit a length limit
    MaxTokens,
}

/// Token usage statistics for one or more provider turns
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Accumulate another turn's usage into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

/// Response from one provider turn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated text, if any
    pub content: Option<String>,

    /// Tool invocations requested this turn (may be empty)
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Why the turn ended
    pub stop_reason: StopReason,

    /// Token usage, when the provider reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    /// Plain text response with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            stop_reason: StopReason::EndTurn,
            usage: None,
        }
    }
}

/// Callback invoked with incremental text as the provider produces it
pub type DeltaCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Strategy trait for LLM providers
///
/// One required method. The agent loop works exclusively through this
/// interface; failures must already be classified (rate-limit, server
/// error, or other) by the time they cross it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one chat turn over the full message list with the tools
    /// currently visible to the caller. `on_delta` receives incremental
    /// text when the backend can produce it.
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        on_delta: Option<DeltaCallback>,
    ) -> Result<LlmResponse>;

    /// Provider name for log attribution
    fn name(&self) -> &str {
        "llm"
    }
}

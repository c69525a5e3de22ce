//! Reasoning Loop
//!
//! The bounded request/response/tool-dispatch cycle around an opaque
//! provider. Each iteration either terminates with a final answer or
//! fans out the turn's tool calls, feeds the results back as one
//! synthetic user message, and asks the provider again.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::provider::{DeltaCallback, LlmProvider, StopReason, TokenUsage};
use crate::tool::{DEFAULT_TOOL_TIMEOUT, ToolCall, ToolRegistry, ToolResult};

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Use the available tools when they help \
     you answer; otherwise answer directly. Be concise and accurate.";

/// Agent configuration, immutable per run
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt seeded at the head of every conversation
    pub system_prompt: String,

    /// Maximum provider turns before giving up
    pub max_iterations: usize,

    /// Sandbox timeout applied to each tool call
    pub tool_timeout: Duration,

    /// Log every iteration at info level instead of debug
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 10,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            verbose: false,
        }
    }
}

/// One tool invocation recorded in an [`AgentResult`]
#[derive(Clone, Debug, Serialize)]
pub struct ToolInvocation {
    pub name: String,
    pub input: Value,
    pub output: String,
}

/// Terminal artifact of one loop run
#[derive(Clone, Debug, Serialize)]
pub struct AgentResult {
    /// Final response text (empty when the provider returned none)
    pub response: String,

    /// Every tool call dispatched during the run, in dispatch order
    pub tools_used: Vec<ToolInvocation>,

    /// Provider turns consumed; always <= `max_iterations`
    pub iterations: usize,

    /// Accumulated token usage across all turns
    pub usage: TokenUsage,
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Run the agent on a user message with prior session history.
    ///
    /// The conversation is seeded as: system prompt, prior history with
    /// system-role entries stripped, then `input`.
    pub async fn run(&self, history: &[Message], input: &str) -> Result<AgentResult> {
        self.run_with_delta(history, input, None).await
    }

    /// Like [`Agent::run`], forwarding incremental text to `on_delta`.
    pub async fn run_with_delta(
        &self,
        history: &[Message],
        input: &str,
        on_delta: Option<DeltaCallback>,
    ) -> Result<AgentResult> {
        let mut conversation = Conversation::seeded(&self.config.system_prompt, history, input);
        let definitions = self.tools.to_definitions();
        let mut usage = TokenUsage::default();
        let mut tools_used: Vec<ToolInvocation> = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            if self.config.verbose {
                tracing::info!(
                    provider = self.provider.name(),
                    iteration,
                    messages = conversation.len(),
                    "calling provider"
                );
            } else {
                tracing::debug!(iteration, messages = conversation.len(), "calling provider");
            }

            let response = self
                .provider
                .chat(conversation.messages(), &definitions, on_delta.clone())
                .await?;

            if let Some(turn_usage) = &response.usage {
                usage.add(turn_usage);
            }

            if response.stop_reason != StopReason::ToolUse || response.tool_calls.is_empty() {
                return Ok(AgentResult {
                    response: response.content.unwrap_or_default(),
                    tools_used,
                    iterations: iteration,
                    usage,
                });
            }

            // Partial assistant text precedes the tool results in the prompt
            if let Some(content) = response.content.as_deref() {
                if !content.is_empty() {
                    conversation.push(Message::assistant(content));
                }
            }

            let results = self.dispatch_all(&response.tool_calls).await;

            let mut lines = Vec::with_capacity(results.len());
            for (call, result) in response.tool_calls.iter().zip(results) {
                lines.push(format!(
                    "Tool \"{}\" returned: {}",
                    call.name, result.content
                ));
                tools_used.push(ToolInvocation {
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                    output: result.content,
                });
            }
            conversation.push(Message::user(lines.join("\n")));
        }

        Err(AgentError::MaxIterations(self.config.max_iterations))
    }

    /// Fan out all tool calls of one turn and await every settlement.
    ///
    /// Results come back in request order; a failing or slow call never
    /// poisons its siblings, its failure simply becomes result data.
    async fn dispatch_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let dispatches = calls.iter().map(|call| self.dispatch(call));
        futures::future::join_all(dispatches).await
    }

    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        match self
            .tools
            .execute(&call.name, call.arguments.clone(), self.config.tool_timeout)
            .await
        {
            Ok(value) => ToolResult::success(&call.id, value.to_string()),
            Err(e) => {
                tracing::warn!(tool = %call.name, id = %call.id, error = %e, "tool call failed");
                ToolResult::failure(&call.id, &e)
            }
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: crate::tool::Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.config.tool_timeout = timeout;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::provider::LlmResponse;
    use crate::tool::{Tool, ToolDefinition};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider that replays scripted responses and records every
    /// message list it was called with.
    struct MockProvider {
        responses: Mutex<VecDeque<LlmResponse>>,
        calls: Mutex<Vec<Vec<Message>>>,
    }

    impl MockProvider {
        fn scripted(responses: Vec<LlmResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn recorded_calls(&self) -> Vec<Vec<Message>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn chat(
            &self,
            messages: &[Message],
            _tools: &[ToolDefinition],
            _on_delta: Option<DeltaCallback>,
        ) -> Result<LlmResponse> {
            self.calls.lock().unwrap().push(messages.to_vec());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| LlmResponse::text("done")))
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn tool_use(calls: Vec<ToolCall>) -> LlmResponse {
        LlmResponse {
            content: None,
            tool_calls: calls,
            stop_reason: StopReason::ToolUse,
            usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            }),
        }
    }

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: serde_json::json!({}),
        }
    }

    struct PingTool;

    #[async_trait]
    impl Tool for PingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "ping".into(),
                description: "Reply with pong".into(),
                input_schema: serde_json::json!({ "type": "object", "properties": {} }),
            }
        }

        async fn execute(&self, _args: Value) -> Result<Value> {
            Ok(Value::String("pong".into()))
        }
    }

    struct SlowPingTool;

    #[async_trait]
    impl Tool for SlowPingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "slow_ping".into(),
                description: "Reply with pong, slowly".into(),
                input_schema: serde_json::json!({ "type": "object", "properties": {} }),
            }
        }

        async fn execute(&self, _args: Value) -> Result<Value> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Value::String("slow pong".into()))
        }
    }

    #[tokio::test]
    async fn single_turn_no_tools() {
        let provider = Arc::new(MockProvider::scripted(vec![LlmResponse {
            content: Some("Hello!".into()),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            }),
        }]));

        let agent = Agent::with_defaults(provider, Arc::new(ToolRegistry::new()));
        let result = agent.run(&[], "Hi").await.unwrap();

        assert_eq!(result.response, "Hello!");
        assert!(result.tools_used.is_empty());
        assert_eq!(result.iterations, 1);
        assert_eq!(result.usage.input_tokens, 10);
        assert_eq!(result.usage.output_tokens, 5);
    }

    #[tokio::test]
    async fn tool_turn_then_final_answer() {
        let provider = Arc::new(MockProvider::scripted(vec![
            tool_use(vec![call("tc1", "ping")]),
            LlmResponse::text("Done!"),
        ]));

        let mut tools = ToolRegistry::new();
        tools.register(PingTool);

        let agent = Agent::with_defaults(provider.clone(), Arc::new(tools));
        let result = agent.run(&[], "ping please").await.unwrap();

        assert_eq!(result.response, "Done!");
        assert_eq!(result.iterations, 2);
        assert_eq!(result.tools_used.len(), 1);
        assert_eq!(result.tools_used[0].name, "ping");
        assert!(result.tools_used[0].output.contains("pong"));

        // The second provider call carries the synthetic tool-result
        // message as the final user entry.
        let calls = provider.recorded_calls();
        let last = calls[1].last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "Tool \"ping\" returned: \"pong\"");
    }

    #[tokio::test]
    async fn iteration_budget_exhaustion_fails_typed() {
        let provider = Arc::new(MockProvider::scripted(vec![
            tool_use(vec![call("tc1", "ping")]),
            tool_use(vec![call("tc2", "ping")]),
            tool_use(vec![call("tc3", "ping")]),
        ]));

        let mut tools = ToolRegistry::new();
        tools.register(PingTool);

        let agent = Agent::new(
            provider,
            Arc::new(tools),
            AgentConfig {
                max_iterations: 3,
                ..Default::default()
            },
        );

        let err = agent.run(&[], "loop forever").await.unwrap_err();
        assert!(matches!(err, AgentError::MaxIterations(3)));
        assert_eq!(err.code(), "MAX_ITERATIONS");
    }

    #[tokio::test]
    async fn failed_tool_becomes_data_not_abort() {
        let provider = Arc::new(MockProvider::scripted(vec![
            tool_use(vec![call("tc1", "missing")]),
            LlmResponse::text("Sorry, that tool is unavailable."),
        ]));

        let agent = Agent::with_defaults(provider.clone(), Arc::new(ToolRegistry::new()));
        let result = agent.run(&[], "try it").await.unwrap();

        assert_eq!(result.response, "Sorry, that tool is unavailable.");
        assert_eq!(result.tools_used.len(), 1);
        assert!(result.tools_used[0].output.contains("Tool not found: missing"));

        let calls = provider.recorded_calls();
        assert!(calls[1]
            .last()
            .unwrap()
            .content
            .contains("Tool not found: missing"));
    }

    #[tokio::test]
    async fn sibling_tool_calls_preserve_request_order() {
        let provider = Arc::new(MockProvider::scripted(vec![
            tool_use(vec![call("tc1", "slow_ping"), call("tc2", "ping")]),
            LlmResponse::text("ok"),
        ]));

        let mut tools = ToolRegistry::new();
        tools.register(SlowPingTool);
        tools.register(PingTool);

        let agent = Agent::with_defaults(provider.clone(), Arc::new(tools));
        let result = agent.run(&[], "both").await.unwrap();

        // The slow call was requested first, so it comes first in both
        // the record and the synthetic message, even though the fast
        // sibling settled earlier.
        assert_eq!(result.tools_used[0].name, "slow_ping");
        assert_eq!(result.tools_used[1].name, "ping");

        let calls = provider.recorded_calls();
        let synthetic = &calls[1].last().unwrap().content;
        let slow_at = synthetic.find("slow_ping").unwrap();
        let fast_at = synthetic.rfind("\"ping\"").unwrap();
        assert!(slow_at < fast_at);
    }

    #[tokio::test]
    async fn usage_accumulates_across_turns() {
        let provider = Arc::new(MockProvider::scripted(vec![
            tool_use(vec![call("tc1", "ping")]),
            LlmResponse {
                content: Some("done".into()),
                tool_calls: vec![],
                stop_reason: StopReason::EndTurn,
                usage: Some(TokenUsage {
                    input_tokens: 7,
                    output_tokens: 3,
                }),
            },
        ]));

        let mut tools = ToolRegistry::new();
        tools.register(PingTool);

        let agent = Agent::with_defaults(provider, Arc::new(tools));
        let result = agent.run(&[], "go").await.unwrap();

        assert_eq!(result.usage.input_tokens, 17);
        assert_eq!(result.usage.output_tokens, 8);
    }

    #[tokio::test]
    async fn builder_requires_provider() {
        let err = AgentBuilder::new().build().unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }
}

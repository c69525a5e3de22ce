//! Application State

use std::sync::Arc;

use agent_core::{LlmProvider, RateLimiter, SessionStore, ToolRegistry};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// LLM provider behind the strategy trait
    pub provider: Arc<dyn LlmProvider>,

    /// Base tool registry; requests see RBAC-scoped views of it
    pub tools: Arc<ToolRegistry>,

    /// Session memory backend (in-memory or Redis)
    pub sessions: Arc<dyn SessionStore>,

    /// Admission control in front of the agent loop
    pub limiter: Arc<RateLimiter>,

    /// Process configuration
    pub config: Arc<ServerConfig>,
}

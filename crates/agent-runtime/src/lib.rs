//! # agent-runtime
//!
//! Runtime adapters for the agent system.
//!
//! ## Providers
//!
//! - **OpenAI-compatible** (default): any endpoint speaking the chat
//!   completions protocol with function calling (OpenAI, Together, Groq,
//!   local gateways)
//!
//! ## Stores
//!
//! - **Redis**: session memory backed by a remote keyed store with
//!   native per-key expiry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::OpenAiProvider;
//!
//! let provider = OpenAiProvider::from_env()?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .build()?;
//! ```

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::{OpenAiConfig, OpenAiProvider};

#[cfg(feature = "redis-store")]
pub mod redis_store;

#[cfg(feature = "redis-store")]
pub use redis_store::RedisSessionStore;

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, LlmProvider, Message, Result, Role, SessionStore, Tool, ToolRegistry,
};

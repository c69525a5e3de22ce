//! # agent-core
//!
//! Core agent orchestration: provider-agnostic LLM abstraction, sandboxed
//! tool execution, role-scoped tool visibility, session memory, and
//! request admission control.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Agent Loop                               │
//! │  ┌───────────┐  ┌──────────────┐  ┌──────────────────────────┐   │
//! │  │ Reasoning │──│ ToolRegistry │──│ LlmProvider (Strategy)   │   │
//! │  └───────────┘  └──────────────┘  └──────────────────────────┘   │
//! │        │                ▲                                        │
//! │  SessionStore     RBAC filter (strict view)                      │
//! └──────────────────────────────────────────────────────────────────┘
//!          ▲
//!    RateLimiter (admission, in front of the loop)
//! ```
//!
//! The `LlmProvider` trait enables swapping between vendors without
//! changing agent logic; the `SessionStore` trait does the same for
//! conversational memory backends.

pub mod error;
pub mod message;
pub mod provider;
pub mod ratelimit;
pub mod rbac;
pub mod reasoning;
pub mod session;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{DeltaCallback, LlmProvider, LlmResponse, StopReason, TokenUsage};
pub use ratelimit::{RateLimitConfig, RateLimitExceeded, RateLimiter};
pub use rbac::{RoleToolConfig, build_filtered_registry, parse_role_tool_config, resolve_role};
pub use reasoning::{Agent, AgentBuilder, AgentConfig, AgentResult, ToolInvocation};
pub use session::{MemorySessionStore, SessionEntry, SessionStore, spawn_cleanup_task};
pub use tool::{Tool, ToolCall, ToolDefinition, ToolRegistry, ToolResult};

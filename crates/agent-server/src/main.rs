//! Agent HTTP Server
//!
//! Axum-based server in front of the agent orchestration core. Inbound
//! requests pass admission control, get an RBAC-scoped tool registry for
//! their resolved role, and run the bounded agent loop with session
//! memory attached.

mod config;
mod handlers;
mod state;
mod telemetry;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use agent_core::{
    LlmProvider, RateLimiter, SessionStore, ToolRegistry,
    session::{MemorySessionStore, spawn_cleanup_task},
    tool::{CalculatorTool, DateTimeTool},
};
use agent_runtime::{OpenAiProvider, RedisSessionStore};

use crate::config::ServerConfig;
use crate::handlers::{chat_handler, health_check, list_tools};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();

    // Fatal on malformed RBAC config: a broken policy must never fail
    // open per-request.
    let config = ServerConfig::from_env()?;
    match &config.rbac {
        Some(rbac) => tracing::info!(roles = rbac.len(), "RBAC tool filtering enabled"),
        None => tracing::info!("RBAC disabled; all tools visible to every role"),
    }

    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::from_env()?);
    tracing::info!(provider = provider.name(), "LLM provider configured");

    let mut tools = ToolRegistry::new();
    tools.register(DateTimeTool);
    tools.register(CalculatorTool);
    tracing::info!(count = tools.len(), names = ?tools.list(), "tools registered");

    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let store = RedisSessionStore::connect_with_ttl(url, config.session_ttl).await?;
            tracing::info!("session store: redis");
            Arc::new(store)
        }
        None => {
            tracing::info!("session store: in-memory");
            Arc::new(MemorySessionStore::new())
        }
    };

    // Periodic sweep runs on its own timer, decoupled from requests.
    let _sweeper = spawn_cleanup_task(sessions.clone(), config.sweep_every, config.session_ttl);

    let limiter = Arc::new(RateLimiter::new(config.rate_limit));
    tracing::info!(
        rpm = config.rate_limit.rpm,
        burst = config.rate_limit.burst,
        "rate limiter configured"
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        provider,
        tools: Arc::new(tools),
        sessions,
        limiter,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat_handler))
        .route("/api/tools", get(list_tools))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("agent server running on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

//! HTTP Handlers
//!
//! The request pipeline: admission control, role resolution, RBAC
//! registry scoping, session load, agent run, session append. The
//! core's stable error codes are mapped to status codes here and
//! nowhere else.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use agent_core::{
    error::AgentError,
    message::Message,
    provider::TokenUsage,
    ratelimit::RateLimitExceeded,
    rbac::{build_filtered_registry, filter_tools_for_role, resolve_role},
    reasoning::{Agent, AgentConfig, ToolInvocation},
};

use crate::state::AppState;

/// Header set by the upstream auth layer after token validation
const ASSERTED_ROLE_HEADER: &str = "x-authenticated-role";

/// Header a client may use to request a role when no auth layer runs
const CLIENT_ROLE_HEADER: &str = "x-user-role";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: String,
    pub tools: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub iterations: usize,
    pub tools_used: Vec<ToolInvocation>,
    pub usage: TokenUsage,
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub role: String,
    pub tools: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider: state.provider.name().to_string(),
        tools: state.tools.len(),
    })
}

/// List the tool names visible to the caller's resolved role
pub async fn list_tools(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<ToolsResponse> {
    let role = effective_role(&state, &headers);
    let tools = filter_tools_for_role(&state.tools.list(), &role, state.config.rbac.as_ref());

    Json(ToolsResponse { role, tools })
}

/// Main chat endpoint
pub async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, Response> {
    // Admission first: a rejected request never reaches the loop.
    let key = client_key(&headers);
    if let Err(rejection) = state.limiter.check(&key) {
        return Err(rate_limited_response(&rejection));
    }

    let role = effective_role(&state, &headers);
    let scoped = build_filtered_registry(&state.tools, &role, state.config.rbac.as_ref());

    let session_id = payload
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // Session memory is best-effort; a store hiccup degrades to a fresh
    // conversation instead of failing the request.
    let entry = match state.sessions.get(&session_id).await {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!(%session_id, error = %e, "session load failed; starting fresh");
            None
        }
    };
    let history: &[Message] = match &entry {
        Some(e) => &e.messages,
        None => &[],
    };

    let mut config = AgentConfig {
        max_iterations: state.config.max_iterations,
        ..Default::default()
    };
    if let Some(prompt) = &state.config.system_prompt {
        config.system_prompt = prompt.clone();
    }

    let agent = Agent::new(state.provider.clone(), Arc::new(scoped), config);

    let result = agent.run(history, &payload.message).await.map_err(|e| {
        tracing::error!(%session_id, %role, code = e.code(), error = %e, "agent run failed");
        agent_error_response(&e)
    })?;

    let mut entry = entry.unwrap_or_default();
    entry.append(Message::user(&payload.message));
    entry.append(Message::assistant(&result.response));
    if let Err(e) = state.sessions.set(&session_id, entry).await {
        tracing::warn!(%session_id, error = %e, "session save failed");
    }

    Ok(Json(ChatResponse {
        response: result.response,
        session_id,
        iterations: result.iterations,
        tools_used: result.tools_used,
        usage: result.usage,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn effective_role(state: &AppState, headers: &HeaderMap) -> String {
    resolve_role(
        header_str(headers, ASSERTED_ROLE_HEADER),
        header_str(headers, CLIENT_ROLE_HEADER),
        state.config.default_role.as_deref(),
    )
}

/// Derive the rate-limit key: first IP of `x-forwarded-for`, else
/// `x-real-ip`, else a shared bucket for unidentified callers.
fn client_key(headers: &HeaderMap) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        return real_ip.to_string();
    }
    "unknown".to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn rate_limited_response(rejection: &RateLimitExceeded) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, rejection.retry_after_secs.to_string())],
        Json(ErrorResponse {
            error: "Too many requests".into(),
            code: "RATE_LIMITED".into(),
        }),
    )
        .into_response()
}

fn agent_error_response(error: &AgentError) -> Response {
    let status = match error.code() {
        "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
        "API_ERROR" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: error.user_message(),
            code: error.code().into(),
        }),
    )
        .into_response()
}

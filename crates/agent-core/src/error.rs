//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Boxed error source attached to provider-boundary failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Provider rejected the request with HTTP 429
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Provider failed server-side (HTTP >= 500)
    #[error("Provider error: {message}")]
    Api {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Maximum iterations reached in the reasoning loop
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool arguments rejected by schema validation
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Tool did not settle within the sandbox timeout
    #[error("Tool '{name}' timed out after {timeout_ms}ms")]
    ToolTimeout { name: String, timeout_ms: u64 },

    /// Configuration error (fatal at startup, never deferred)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session store error
    #[error("Session error: {0}")]
    Session(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unclassified provider or internal failure
    #[error("{message}")]
    Unknown {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        let message = err.to_string();
        AgentError::Unknown {
            message,
            source: Some(err.into()),
        }
    }
}

impl AgentError {
    /// Classify a provider HTTP failure into a typed error.
    ///
    /// 429 -> `RateLimited`, >= 500 -> `Api`, anything else -> `Unknown`.
    pub fn from_provider_status(
        status: u16,
        message: impl Into<String>,
        source: Option<BoxError>,
    ) -> Self {
        let message = message.into();
        match status {
            429 => AgentError::RateLimited { message, source },
            s if s >= 500 => AgentError::Api { message, source },
            _ => AgentError::Unknown { message, source },
        }
    }

    /// Stable machine-readable code, the core's contract with the
    /// surrounding transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::RateLimited { .. } => "RATE_LIMITED",
            AgentError::Api { .. } => "API_ERROR",
            AgentError::MaxIterations(_) => "MAX_ITERATIONS",
            AgentError::ToolNotFound(_)
            | AgentError::ToolValidation(_)
            | AgentError::ToolExecution(_)
            | AgentError::ToolTimeout { .. } => "TOOL_ERROR",
            AgentError::Config(_)
            | AgentError::Session(_)
            | AgentError::Json(_)
            | AgentError::Unknown { .. } => "UNKNOWN",
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::RateLimited { .. } => {
                "Too many requests to the AI service. Please wait a moment.".into()
            }
            AgentError::Api { .. } => {
                "The AI service encountered an error. Please try again.".into()
            }
            AgentError::MaxIterations(_) => {
                "The request took too long to process. Please try a simpler query.".into()
            }
            AgentError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            AgentError::ToolValidation(msg) => format!("Invalid tool input: {}", msg),
            AgentError::ToolExecution(msg) => format!("Tool error: {}", msg),
            AgentError::ToolTimeout { name, .. } => {
                format!("The tool '{}' took too long to respond.", name)
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}

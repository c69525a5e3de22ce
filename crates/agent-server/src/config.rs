//! Server Configuration
//!
//! Environment-driven configuration, loaded once at startup. A malformed
//! RBAC config aborts the process here rather than failing open later.

use std::time::Duration;

use agent_core::error::Result;
use agent_core::ratelimit::RateLimitConfig;
use agent_core::rbac::{self, RoleToolConfig};

/// Process configuration for the agent server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (`BIND_ADDR`, default `0.0.0.0:3000`)
    pub bind_addr: String,

    /// System prompt for every agent run (`SYSTEM_PROMPT`)
    pub system_prompt: Option<String>,

    /// Provider-turn budget per request (`AGENT_MAX_ITERATIONS`, default 10)
    pub max_iterations: usize,

    /// Default role when neither auth layer nor client supplies one
    /// (`DEFAULT_ROLE`)
    pub default_role: Option<String>,

    /// Role -> allowed tool names (`ROLE_TOOL_CONFIG`); `None` disables RBAC
    pub rbac: Option<RoleToolConfig>,

    /// Admission control settings (`RATE_LIMIT_RPM` / `RATE_LIMIT_BURST`)
    pub rate_limit: RateLimitConfig,

    /// Session idle lifetime (`SESSION_TTL_SECS`, default 1800)
    pub session_ttl: Duration,

    /// Interval between session sweeps (`SESSION_SWEEP_SECS`, default 300)
    pub sweep_every: Duration,

    /// Redis URL for the session backend (`REDIS_URL`); in-memory when unset
    pub redis_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let rbac = {
            let raw = std::env::var("ROLE_TOOL_CONFIG").ok();
            rbac::parse_role_tool_config(raw.as_deref())?
        };

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into()),
            system_prompt: std::env::var("SYSTEM_PROMPT").ok(),
            max_iterations: env_parse("AGENT_MAX_ITERATIONS", 10),
            default_role: std::env::var("DEFAULT_ROLE").ok(),
            rbac,
            rate_limit: RateLimitConfig {
                rpm: env_parse("RATE_LIMIT_RPM", 60),
                burst: env_parse("RATE_LIMIT_BURST", 10),
            },
            session_ttl: Duration::from_secs(env_parse("SESSION_TTL_SECS", 30 * 60)),
            sweep_every: Duration::from_secs(env_parse("SESSION_SWEEP_SECS", 5 * 60)),
            redis_url: std::env::var("REDIS_URL").ok(),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_when_unset() {
        assert_eq!(env_parse("THIS_ENV_VAR_DOES_NOT_EXIST", 42usize), 42);
    }
}

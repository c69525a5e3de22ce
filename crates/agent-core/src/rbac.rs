//! Role-Based Tool Visibility
//!
//! A declarative role -> allowed-tool-names map scopes which tools a
//! caller may see. A filtered registry is always a strict view of its
//! base, never a mutation of it. Malformed configuration is a fatal
//! startup error, never a request-time one.

use std::collections::HashMap;

use crate::error::{AgentError, Result};
use crate::tool::ToolRegistry;

/// Role name -> allowed tool names, with `"all"` meaning unrestricted
pub type RoleToolConfig = HashMap<String, Vec<String>>;

/// Sentinel list entry granting every tool
pub const ALL_TOOLS: &str = "all";

/// Role used when nothing else resolves
pub const DEFAULT_ROLE: &str = "user";

/// Parse the RBAC configuration from its environment-level string.
///
/// `None` or blank input disables RBAC entirely (`Ok(None)`). Anything
/// else must be a flat JSON object whose every value is an array of
/// strings; any other shape is a configuration error.
pub fn parse_role_tool_config(raw: Option<&str>) -> Result<Option<RoleToolConfig>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let config: RoleToolConfig = serde_json::from_str(raw).map_err(|e| {
        AgentError::Config(format!(
            "role-tool config must be a flat object of string arrays: {}",
            e
        ))
    })?;

    Ok(Some(config))
}

/// Filter tool names visible to `role`, preserving the order of `all`.
///
/// A role absent from the config falls back to the `"user"` entry; when
/// neither exists the full list is returned and a warning is emitted
/// (documented fail-open behavior). Configured names that do not exist
/// in `all` are silently dropped.
pub fn filter_tools_for_role(
    all: &[String],
    role: &str,
    config: Option<&RoleToolConfig>,
) -> Vec<String> {
    let Some(config) = config else {
        return all.to_vec();
    };

    let Some(allowed) = config.get(role).or_else(|| config.get(DEFAULT_ROLE)) else {
        tracing::warn!(
            role,
            "role has no RBAC entry and no '{}' fallback exists; allowing all tools",
            DEFAULT_ROLE
        );
        return all.to_vec();
    };

    if allowed.iter().any(|name| name == ALL_TOOLS) {
        return all.to_vec();
    }

    all.iter()
        .filter(|name| allowed.contains(name))
        .cloned()
        .collect()
}

/// Resolve the effective role for a request.
///
/// Priority: a pre-validated role asserted by the auth layer, then a
/// client-supplied header value, then the configured default, then the
/// literal `"user"`. Values are trimmed; blank means absent.
pub fn resolve_role(
    asserted: Option<&str>,
    header: Option<&str>,
    default_role: Option<&str>,
) -> String {
    for candidate in [asserted, header, default_role] {
        if let Some(value) = candidate {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    DEFAULT_ROLE.to_string()
}

/// Build a fresh registry holding only the tools `role` may see.
///
/// Tool handles are shared by reference with `base`; `base` itself is
/// never mutated.
pub fn build_filtered_registry(
    base: &ToolRegistry,
    role: &str,
    config: Option<&RoleToolConfig>,
) -> ToolRegistry {
    let allowed = filter_tools_for_role(&base.list(), role, config);

    let mut filtered = ToolRegistry::new();
    for name in &allowed {
        if let Some(tool) = base.get(name) {
            filtered.register_arc(tool);
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::tool::{CalculatorTool, DateTimeTool, Tool, ToolDefinition};
    use async_trait::async_trait;
    use serde_json::Value;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    fn config(json: &str) -> RoleToolConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parse_absent_or_blank_disables_rbac() {
        assert!(parse_role_tool_config(None).unwrap().is_none());
        assert!(parse_role_tool_config(Some("")).unwrap().is_none());
        assert!(parse_role_tool_config(Some("   ")).unwrap().is_none());
    }

    #[test]
    fn parse_rejects_malformed_shapes() {
        for bad in [
            "not json",
            "[\"a\"]",
            "{\"admin\": \"all\"}",
            "{\"admin\": [1, 2]}",
            "{\"admin\": {\"nested\": []}}",
        ] {
            let err = parse_role_tool_config(Some(bad)).unwrap_err();
            assert!(matches!(err, AgentError::Config(_)), "accepted: {bad}");
        }
    }

    #[test]
    fn parse_accepts_flat_string_arrays() {
        let parsed = parse_role_tool_config(Some(r#"{"user": ["search"], "admin": ["all"]}"#))
            .unwrap()
            .unwrap();
        assert_eq!(parsed["user"], vec!["search"]);
    }

    #[test]
    fn filter_disabled_config_passes_all() {
        let all = names(&["search", "fetch_url", "calc"]);
        assert_eq!(filter_tools_for_role(&all, "anyone", None), all);
    }

    #[test]
    fn filter_intersects_preserving_order() {
        let all = names(&["search", "fetch_url", "calc"]);
        let cfg = config(r#"{"user": ["calc", "search", "ghost"]}"#);

        let visible = filter_tools_for_role(&all, "user", Some(&cfg));
        assert_eq!(visible, names(&["search", "calc"]));
    }

    #[test]
    fn filter_all_sentinel_is_unrestricted() {
        let all = names(&["search", "calc"]);
        let cfg = config(r#"{"admin": ["all"]}"#);
        assert_eq!(filter_tools_for_role(&all, "admin", Some(&cfg)), all);
    }

    #[test]
    fn filter_unknown_role_falls_back_to_user_entry() {
        let all = names(&["search", "fetch_url", "calc"]);
        let cfg = config(r#"{"user": ["search"]}"#);

        let visible = filter_tools_for_role(&all, "viewer", Some(&cfg));
        assert_eq!(visible, names(&["search"]));
    }

    #[test]
    fn filter_without_role_or_user_entry_fails_open() {
        let all = names(&["search", "calc"]);
        let cfg = config(r#"{"admin": ["all"]}"#);
        assert_eq!(filter_tools_for_role(&all, "viewer", Some(&cfg)), all);
    }

    #[test]
    fn role_resolution_priority() {
        assert_eq!(
            resolve_role(Some("admin"), Some("viewer"), Some("support")),
            "admin"
        );
        assert_eq!(resolve_role(None, Some("viewer"), Some("support")), "viewer");
        assert_eq!(resolve_role(None, Some("  "), Some("support")), "support");
        assert_eq!(resolve_role(None, None, None), "user");
        // Asserted wins even when it matches the header
        assert_eq!(resolve_role(Some("viewer"), Some("viewer"), None), "viewer");
    }

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.0.into(),
                description: String::new(),
                input_schema: serde_json::json!({ "type": "object", "properties": {} }),
            }
        }

        async fn execute(&self, _args: Value) -> crate::error::Result<Value> {
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn filtered_registry_is_a_strict_subset_view() {
        let mut base = ToolRegistry::new();
        base.register(NamedTool("search"));
        base.register(NamedTool("fetch_url"));
        base.register(NamedTool("calc"));

        let cfg = config(r#"{"user": ["search", "calc"]}"#);
        let filtered = build_filtered_registry(&base, "user", Some(&cfg));

        assert_eq!(filtered.list(), names(&["search", "calc"]));
        // Base untouched
        assert_eq!(base.list(), names(&["search", "fetch_url", "calc"]));

        // Executing a hidden tool fails with the uniform not-found error
        let err = filtered
            .execute(
                "fetch_url",
                serde_json::json!({}),
                crate::tool::DEFAULT_TOOL_TIMEOUT,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Tool not found: fetch_url");
    }

    #[test]
    fn filtered_registry_with_builtin_tools() {
        let mut base = ToolRegistry::new();
        base.register(DateTimeTool);
        base.register(CalculatorTool);

        let cfg = config(r#"{"user": ["calc"]}"#);
        let filtered = build_filtered_registry(&base, "user", Some(&cfg));
        assert_eq!(filtered.list(), names(&["calc"]));
    }
}

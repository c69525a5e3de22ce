//! Tool System
//!
//! Extensible tool framework for agent capabilities. Tools are registered
//! at runtime and invoked by the reasoning loop through a sandboxed
//! `execute` that validates arguments and races the callable against a
//! timeout. Input schemas are data, not compile-time types, so the
//! sandbox stays schema-agnostic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};

/// Default sandbox timeout for one tool call
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Tool shape advertised to the LLM provider
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool identifier within a registry snapshot
    pub name: String,

    /// Human-readable description (shown to the LLM)
    pub description: String,

    /// JSON Schema for the arguments object
    pub input_schema: Value,
}

/// One tool invocation requested by the provider in a single turn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-issued call ID
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Raw arguments as a JSON object
    #[serde(default)]
    pub arguments: Value,
}

/// Outcome fed back to the provider, produced even on failure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the call this result answers
    pub tool_call_id: String,

    /// Serialized output or `{"error": ...}` payload
    pub content: String,

    /// Whether the call failed
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn failure(tool_call_id: impl Into<String>, error: &AgentError) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: serde_json::json!({ "error": error.to_string() }).to_string(),
            is_error: true,
        }
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's definition, including its argument schema
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with validated arguments
    async fn execute(&self, args: Value) -> Result<Value>;

    /// Validate raw arguments against the declared schema.
    ///
    /// The default walks the schema as data: arguments must be an object,
    /// every `required` key must be present, and declared property types
    /// must match.
    fn validate(&self, raw: &Value) -> Result<Value> {
        let schema = self.definition().input_schema;
        validate_against_schema(&schema, raw)?;
        Ok(raw.clone())
    }
}

/// Check a raw arguments value against a JSON-schema-shaped object.
fn validate_against_schema(schema: &Value, raw: &Value) -> Result<()> {
    let Some(args) = raw.as_object() else {
        return Err(AgentError::ToolValidation(
            "arguments must be a JSON object".into(),
        ));
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(key) {
                return Err(AgentError::ToolValidation(format!(
                    "missing required parameter: {}",
                    key
                )));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, prop) in properties {
            let Some(value) = args.get(key) else { continue };
            let Some(expected) = prop.get("type").and_then(Value::as_str) else {
                continue;
            };
            if !type_matches(expected, value) {
                return Err(AgentError::ToolValidation(format!(
                    "parameter '{}' must be of type {}",
                    key, expected
                )));
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// Registry for available tools
///
/// Names are unique per snapshot; `list()` and `to_definitions()` preserve
/// registration order. Re-registering a name replaces the tool but keeps
/// its original slot.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool, replacing any existing tool of the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool handle
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names in registration order
    pub fn list(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Project the registry to the wire shape the provider needs
    pub fn to_definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one tool by name inside the sandbox.
    ///
    /// Validates arguments against the tool's schema, then races the
    /// callable against `timeout`. On timeout the in-flight work is left
    /// unreferenced: the contract is "stop waiting", not "stop running".
    pub async fn execute(&self, name: &str, raw_args: Value, timeout: Duration) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;

        let args = tool.validate(&raw_args)?;

        match tokio::time::timeout(timeout, tool.execute(args)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(match e {
                e @ (AgentError::ToolValidation(_) | AgentError::ToolExecution(_)) => e,
                other => AgentError::ToolExecution(other.to_string()),
            }),
            Err(_) => Err(AgentError::ToolTimeout {
                name: name.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// DateTime tool - returns current time
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "datetime".into(),
            description: "Get the current date and time (UTC)".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "description": "Output format: 'iso', 'human', or 'unix'",
                        "enum": ["iso", "human", "unix"]
                    }
                },
                "required": []
            }),
        }
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let format = args.get("format").and_then(Value::as_str).unwrap_or("human");
        let now = chrono::Utc::now();

        let output = match format {
            "iso" => now.to_rfc3339(),
            "unix" => now.timestamp().to_string(),
            _ => now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string(),
        };

        Ok(Value::String(output))
    }
}

/// Calculator tool - evaluates arithmetic expressions
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "calc".into(),
            description: "Evaluate an arithmetic expression with +, -, *, /, ^ and parentheses"
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "Expression to evaluate, e.g. '(2 + 3) * 4'"
                    }
                },
                "required": ["expression"]
            }),
        }
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let expr = args
            .get("expression")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ToolValidation("missing expression".into()))?;

        let result = eval_expression(expr)
            .map_err(|e| AgentError::ToolExecution(format!("{}: {}", expr, e)))?;

        Ok(serde_json::json!({ "expression": expr, "result": result }))
    }
}

/// Precedence-climbing evaluator over a token stream.
fn eval_expression(input: &str) -> std::result::Result<f64, String> {
    let tokens = lex(input)?;
    let mut pos = 0;
    let value = parse_expr(&tokens, &mut pos, 0)?;
    if pos != tokens.len() {
        return Err(format!("unexpected token at position {}", pos));
    }
    Ok(value)
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    Open,
    Close,
}

fn lex(input: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut num = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = num.parse::<f64>().map_err(|e| e.to_string())?;
                tokens.push(Token::Num(value));
            }
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

fn parse_expr(
    tokens: &[Token],
    pos: &mut usize,
    min_prec: u8,
) -> std::result::Result<f64, String> {
    let mut lhs = parse_atom(tokens, pos)?;

    while let Some(Token::Op(op)) = tokens.get(*pos) {
        let (prec, right_assoc) = match op {
            '+' | '-' => (1, false),
            '*' | '/' => (2, false),
            '^' => (3, true),
            _ => return Err(format!("unknown operator '{}'", op)),
        };
        if prec < min_prec {
            break;
        }
        let op = *op;
        *pos += 1;
        let next_min = if right_assoc { prec } else { prec + 1 };
        let rhs = parse_expr(tokens, pos, next_min)?;

        lhs = match op {
            '+' => lhs + rhs,
            '-' => lhs - rhs,
            '*' => lhs * rhs,
            '/' => {
                if rhs == 0.0 {
                    return Err("division by zero".into());
                }
                lhs / rhs
            }
            _ => lhs.powf(rhs),
        };
    }

    Ok(lhs)
}

fn parse_atom(tokens: &[Token], pos: &mut usize) -> std::result::Result<f64, String> {
    match tokens.get(*pos) {
        Some(Token::Num(n)) => {
            *pos += 1;
            Ok(*n)
        }
        Some(Token::Op('-')) => {
            *pos += 1;
            Ok(-parse_atom(tokens, pos)?)
        }
        Some(Token::Open) => {
            *pos += 1;
            let value = parse_expr(tokens, pos, 0)?;
            match tokens.get(*pos) {
                Some(Token::Close) => {
                    *pos += 1;
                    Ok(value)
                }
                _ => Err("unbalanced parentheses".into()),
            }
        }
        _ => Err("expected a number".into()),
    }
}

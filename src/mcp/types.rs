//! Shared MCP types: tool definitions, client lifecycle states, result helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Definition of a tool that can be called by the LLM.
///
/// Immutable once discovered from a server.
///
/// # Example
///
/// ```
/// use mcphost::mcp::ToolDefinition;
/// use serde_json::json;
///
/// let tool = ToolDefinition::new(
///     "web_search",
///     "Search the web for information",
///     json!({
///         "type": "object",
///         "properties": { "query": { "type": "string" } },
///         "required": ["query"]
///     }),
/// );
/// assert_eq!(tool.name, "web_search");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool (must be unique across servers).
    pub name: String,
    /// A description of what the tool does.
    pub description: String,
    /// JSON Schema describing the tool's parameters.
    #[serde(alias = "inputSchema", alias = "input_schema")]
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Tool name → definition. Ordered so wire payloads are deterministic.
pub type ToolSet = BTreeMap<String, ToolDefinition>;

/// Registry slot identifier. Routing maps refer to clients by id only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub(crate) u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a named client. A name with no state is unregistered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Connecting,
    Connected,
    Failed,
    Disconnected,
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClientStatus::Connecting => "connecting",
            ClientStatus::Connected => "connected",
            ClientStatus::Failed => "failed",
            ClientStatus::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// Diagnostic snapshot of one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    pub name: String,
    pub status: ClientStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Flatten a tool result into text for the model.
///
/// Understands MCP `{"content":[{"type":"text","text":..}], "isError":..}`
/// results and plain strings; anything else is rendered as compact JSON.
pub fn result_text(result: &Value) -> String {
    match result {
        Value::String(s) => s.clone(),
        Value::Object(obj) => match obj.get("content") {
            Some(Value::Array(blocks)) => {
                let text = blocks
                    .iter()
                    .filter_map(|b| match b.get("type").and_then(Value::as_str) {
                        Some("text") => b.get("text").and_then(Value::as_str).map(str::to_string),
                        Some(other) => Some(format!("[{} content]", other)),
                        None => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                let is_error = obj.get("isError").and_then(Value::as_bool).unwrap_or(false);
                match (text.is_empty(), is_error) {
                    (true, true) => "MCP tool returned error".to_string(),
                    (true, false) => "(no output)".to_string(),
                    (false, true) => format!("Error: {}", text),
                    (false, false) => text,
                }
            }
            _ => result.to_string(),
        },
        Value::Null => "(no output)".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_definition_accepts_input_schema_alias() {
        let def: ToolDefinition = serde_json::from_value(json!({
            "name": "echo",
            "description": "Echo",
            "inputSchema": {"type": "object"}
        }))
        .unwrap();
        assert_eq!(def.parameters["type"], "object");
    }

    #[test]
    fn test_result_text_content_blocks() {
        let v = json!({"content": [
            {"type": "text", "text": "line one"},
            {"type": "image", "data": "..."},
            {"type": "text", "text": "line two"}
        ]});
        assert_eq!(result_text(&v), "line one\n[image content]\nline two");
    }

    #[test]
    fn test_result_text_error_flag() {
        let v = json!({"content": [{"type": "text", "text": "no such file"}], "isError": true});
        assert_eq!(result_text(&v), "Error: no such file");
        let empty = json!({"content": [], "isError": true});
        assert_eq!(result_text(&empty), "MCP tool returned error");
    }

    #[test]
    fn test_result_text_plain_values() {
        assert_eq!(result_text(&json!("hello")), "hello");
        assert_eq!(result_text(&json!(42)), "42");
        assert_eq!(result_text(&Value::Null), "(no output)");
        assert_eq!(result_text(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_client_status_display() {
        assert_eq!(ClientStatus::Failed.to_string(), "failed");
        assert_eq!(ClientId(7).to_string(), "#7");
    }
}

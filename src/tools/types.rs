//! Tool types for mcphost
//!
//! This module defines the `Tool` trait implemented by every in-process tool,
//! and the manifest types a local tool directory is made of.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::Result;

/// An in-process tool served by a [`LocalToolServer`](super::LocalToolServer).
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name exposed to the model.
    fn name(&self) -> &str;

    /// What the tool does, for the model.
    fn description(&self) -> &str;

    /// JSON Schema of the arguments.
    fn parameters(&self) -> Value;

    /// Run the tool. The returned text becomes the tool result.
    async fn execute(&self, args: Value) -> Result<String>;
}

/// One tool file in a tool directory.
///
/// Either `<dir>/<name>/manifest.json` or `<dir>/<name>.json`.
///
/// # Example
///
/// ```
/// use mcphost::tools::ToolManifest;
///
/// let manifest: ToolManifest = serde_json::from_str(r#"{
///     "name": "git-tools",
///     "tools": [{
///         "name": "git_status",
///         "description": "Show working tree status",
///         "command": "git -C {{path}} status --porcelain"
///     }]
/// }"#).unwrap();
/// assert_eq!(manifest.tools[0].effective_timeout(), 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManifest {
    /// Manifest name, used in logs.
    pub name: String,
    /// Optional human description.
    #[serde(default)]
    pub description: Option<String>,
    /// Tools defined by this manifest.
    #[serde(default)]
    pub tools: Vec<CommandToolDef>,
}

/// A tool backed by a shell command template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandToolDef {
    /// Tool name (alphanumeric, `_` and `-` only).
    pub name: String,
    pub description: String,
    /// Argument schema. Defaults to an empty object schema.
    #[serde(default = "default_parameters")]
    pub parameters: Value,
    /// Shell command. `{{param}}` placeholders are replaced with shell-escaped values.
    pub command: String,
    #[serde(default)]
    pub working_dir: Option<String>,
    /// Command timeout in seconds (default: 30).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,
}

impl CommandToolDef {
    pub fn effective_timeout(&self) -> u64 {
        self.timeout_secs.unwrap_or(30)
    }

    /// Names the model can call: non-empty, ASCII alphanumeric, `_` or `-`.
    pub fn has_valid_name(&self) -> bool {
        !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

fn default_parameters() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_tool_def_defaults() {
        let def: CommandToolDef =
            serde_json::from_str(r#"{"name":"t","description":"d","command":"true"}"#).unwrap();
        assert_eq!(def.effective_timeout(), 30);
        assert_eq!(def.parameters["type"], "object");
        assert!(def.env.is_none());
    }

    #[test]
    fn test_valid_names() {
        let mut def: CommandToolDef =
            serde_json::from_str(r#"{"name":"cpu-temp_2","description":"d","command":"true"}"#)
                .unwrap();
        assert!(def.has_valid_name());
        def.name = "rm -rf".into();
        assert!(!def.has_valid_name());
        def.name = String::new();
        assert!(!def.has_valid_name());
    }
}

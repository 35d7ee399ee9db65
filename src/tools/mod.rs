//! Tools module - in-process tools served over the protocol client contract
//!
//! # Overview
//!
//! - `Tool` trait: the interface every in-process tool implements
//! - `ToolRegistry`: explicit registry object, filled by the caller
//! - `CommandTool`: shell command template loaded from a tool manifest
//! - `LocalToolServer`: exposes a registry as a `ProtocolClient`
//!
//! # Example
//!
//! ```rust
//! use mcphost::config::{McpServerConfig, McpTransportKind};
//! use mcphost::mcp::{result_text, ProtocolClient};
//! use mcphost::tools::{EchoTool, LocalToolServer, ToolRegistry};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut registry = ToolRegistry::new();
//! registry.register(Box::new(EchoTool));
//!
//! let server = LocalToolServer::new(registry);
//! let cfg = McpServerConfig::new("local", McpTransportKind::Local);
//! server.connect("local", &cfg).await.unwrap();
//!
//! let out = server.call_tool("echo", json!({"message": "Hello!"})).await.unwrap();
//! assert_eq!(result_text(&out), "Hello!");
//! # });
//! ```

mod command;
mod local;
mod manifest;
mod registry;
mod types;

pub use command::CommandTool;
pub use local::LocalToolServer;
pub use manifest::{discover_manifests, load_manifest, register_directory};
pub use registry::ToolRegistry;
pub use types::{CommandToolDef, Tool, ToolManifest};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Echoes back the `message` argument. Handy for wiring tests.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the provided message"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");
        Ok(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_echo_tool_parameters() {
        let params = EchoTool.parameters();
        assert_eq!(params["type"], "object");
        assert_eq!(params["properties"]["message"]["type"], "string");
    }

    #[tokio::test]
    async fn test_echo_tool_execute() {
        let result = EchoTool.execute(json!({"message": "Line1\nLine2"})).await;
        assert_eq!(result.unwrap(), "Line1\nLine2");
    }

    #[tokio::test]
    async fn test_echo_tool_execute_no_message() {
        let result = EchoTool.execute(json!({})).await;
        assert_eq!(result.unwrap(), "(no message)");
    }
}

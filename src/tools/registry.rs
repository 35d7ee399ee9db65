//! Tool registry for mcphost
//!
//! An explicit registry object: tools are registered by the caller and the
//! registry is handed by value to a [`LocalToolServer`](super::LocalToolServer).
//! There is no process-wide registration.

use std::collections::BTreeMap;
use std::time::Instant;

use serde_json::Value;
use tracing::{error, info};

use crate::error::{HostError, Result};
use crate::mcp::{ToolDefinition, ToolSet};

use super::Tool;

/// A registry that holds and manages tools.
///
/// # Example
///
/// ```rust
/// use mcphost::tools::{ToolRegistry, EchoTool};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.register(Box::new(EchoTool));
///
/// assert!(registry.has("echo"));
/// let result = registry.execute("echo", json!({"message": "hello"})).await;
/// assert_eq!(result.unwrap(), "hello");
/// # });
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Check if a tool exists in the registry.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions of every registered tool.
    pub fn tool_set(&self) -> ToolSet {
        self.tools
            .values()
            .map(|t| {
                (
                    t.name().to_string(),
                    ToolDefinition::new(t.name(), t.description(), t.parameters()),
                )
            })
            .collect()
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, args: Value) -> Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| HostError::ToolNotFound(name.to_string()))?;

        let start = Instant::now();
        match tool.execute(args).await {
            Ok(output) => {
                info!(
                    tool = name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed successfully"
                );
                Ok(output)
            }
            Err(e) => {
                error!(
                    tool = name,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;
    use serde_json::json;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());
        registry.register(Box::new(EchoTool));
        assert!(registry.has("echo"));
        assert_eq!(registry.get("echo").map(|t| t.name()), Some("echo"));
        assert_eq!(registry.names(), vec!["echo"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_tool_set() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let set = registry.tool_set();
        assert_eq!(set["echo"].description, EchoTool.description());
        assert_eq!(set["echo"].parameters["required"][0], "message");
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.execute("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, HostError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_execute_echo() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let out = registry
            .execute("echo", json!({"message": "ping"}))
            .await
            .unwrap();
        assert_eq!(out, "ping");
    }
}

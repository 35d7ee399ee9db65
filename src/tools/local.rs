//! In-process protocol server over a [`ToolRegistry`].

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::info;

use crate::config::McpServerConfig;
use crate::error::{HostError, Result};
use crate::mcp::{ProtocolClient, ToolSet};

use super::manifest::register_directory;
use super::registry::ToolRegistry;

/// Serves registry tools through the [`ProtocolClient`] contract.
///
/// Tool results use the MCP content shape
/// `{"content":[{"type":"text","text":...}]}`. Prompts and resources are not
/// offered.
pub struct LocalToolServer {
    registry: RwLock<ToolRegistry>,
    connected: AtomicBool,
}

impl LocalToolServer {
    /// Server over an explicit registry.
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: RwLock::new(registry),
            connected: AtomicBool::new(false),
        }
    }

    /// Empty server that loads its tools from `directory` on connect.
    pub fn unloaded() -> Self {
        Self::new(ToolRegistry::new())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(HostError::Mcp("local tool server is not connected".into()))
        }
    }
}

#[async_trait]
impl ProtocolClient for LocalToolServer {
    async fn connect(&self, name: &str, config: &McpServerConfig) -> Result<()> {
        if let Some(dir) = &config.directory {
            let mut loaded = ToolRegistry::new();
            let count = register_directory(&mut loaded, Path::new(dir)).map_err(|e| {
                HostError::Connection {
                    server: name.to_string(),
                    message: e.to_string(),
                }
            })?;
            info!(server = %name, tools = count, directory = %dir, "Loaded local tools");
            *self.registry.write().await = loaded;
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get_tools(&self) -> Result<ToolSet> {
        self.ensure_connected()?;
        Ok(self.registry.read().await.tool_set())
    }

    async fn list_prompts(&self) -> Result<Vec<String>> {
        Err(HostError::CapabilityUnsupported("prompts".into()))
    }

    async fn list_resources(&self) -> Result<Vec<String>> {
        Err(HostError::CapabilityUnsupported("resources".into()))
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<Value> {
        self.ensure_connected()?;
        let text = self.registry.read().await.execute(name, args).await?;
        Ok(json!({"content": [{"type": "text", "text": text}]}))
    }

    async fn get_prompt(&self, name: &str, _args: Value) -> Result<Value> {
        Err(HostError::CapabilityUnsupported(format!("prompts ({})", name)))
    }

    async fn read_resource(&self, uri: &str) -> Result<Value> {
        Err(HostError::CapabilityUnsupported(format!("resources ({})", uri)))
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::McpTransportKind;
    use crate::mcp::result_text;
    use crate::tools::EchoTool;

    fn echo_server() -> LocalToolServer {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        LocalToolServer::new(registry)
    }

    #[tokio::test]
    async fn test_requires_connect() {
        let server = echo_server();
        assert!(server.get_tools().await.is_err());
        let cfg = McpServerConfig::new("local", McpTransportKind::Local);
        server.connect("local", &cfg).await.unwrap();
        assert!(server.get_tools().await.unwrap().contains_key("echo"));
    }

    #[tokio::test]
    async fn test_call_tool_uses_content_shape() {
        let server = echo_server();
        let cfg = McpServerConfig::new("local", McpTransportKind::Local);
        server.connect("local", &cfg).await.unwrap();
        let out = server
            .call_tool("echo", json!({"message": "hi"}))
            .await
            .unwrap();
        assert_eq!(result_text(&out), "hi");
    }

    #[tokio::test]
    async fn test_prompts_and_resources_unsupported() {
        let server = echo_server();
        assert!(matches!(
            server.list_prompts().await,
            Err(HostError::CapabilityUnsupported(_))
        ));
        assert!(matches!(
            server.read_resource("file:///x").await,
            Err(HostError::CapabilityUnsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_loads_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("greet.json"),
            r#"{"name":"greet","tools":[{"name":"greet","description":"Greet","command":"echo hi {{who}}"}]}"#,
        )
        .unwrap();

        let server = LocalToolServer::unloaded();
        let mut cfg = McpServerConfig::new("local", McpTransportKind::Local);
        cfg.directory = Some(dir.path().to_string_lossy().into_owned());
        server.connect("local", &cfg).await.unwrap();

        let tools = server.get_tools().await.unwrap();
        assert_eq!(tools.keys().collect::<Vec<_>>(), vec!["greet"]);
        let out = server.call_tool("greet", json!({"who": "bob"})).await.unwrap();
        assert_eq!(result_text(&out).trim(), "hi bob");

        server.disconnect().await.unwrap();
        server.disconnect().await.unwrap();
        assert!(server.get_tools().await.is_err());
    }

    #[tokio::test]
    async fn test_connect_missing_directory_fails() {
        let server = LocalToolServer::unloaded();
        let mut cfg = McpServerConfig::new("local", McpTransportKind::Local);
        cfg.directory = Some("/nonexistent/mcphost".into());
        let err = server.connect("local", &cfg).await.unwrap_err();
        assert!(matches!(err, HostError::Connection { .. }));
    }
}

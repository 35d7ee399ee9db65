//! Protocol client contract and client construction.
//!
//! A [`ProtocolClient`] owns one connection to one server. Wire framing
//! (stdio, SSE, HTTP) lives in implementations outside this crate and is
//! plugged into [`DefaultClientFactory`] per transport kind.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::types::ToolSet;
use crate::config::{McpServerConfig, McpTransportKind};
use crate::error::{HostError, Result};
use crate::tools::LocalToolServer;

/// One server connection as seen by the client manager.
///
/// Discovery calls are independently fallible. Implementations use interior
/// mutability; the manager shares each client behind an `Arc`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Establish the transport session.
    async fn connect(&self, name: &str, config: &McpServerConfig) -> Result<()>;

    /// Tools currently offered by the server.
    async fn get_tools(&self) -> Result<ToolSet>;

    /// Prompt names. Servers without the capability return an error.
    async fn list_prompts(&self) -> Result<Vec<String>>;

    /// Resource URIs. Servers without the capability return an error.
    async fn list_resources(&self) -> Result<Vec<String>>;

    /// Invoke a tool. Errors are passed through verbatim.
    async fn call_tool(&self, name: &str, args: Value) -> Result<Value>;

    async fn get_prompt(&self, name: &str, args: Value) -> Result<Value>;

    async fn read_resource(&self, uri: &str) -> Result<Value>;

    /// Idempotent teardown.
    async fn disconnect(&self) -> Result<()>;
}

/// Builds an unconnected client for a server config.
pub trait ClientFactory: Send + Sync {
    fn create(&self, name: &str, config: &McpServerConfig) -> Result<Arc<dyn ProtocolClient>>;
}

impl<F> ClientFactory for F
where
    F: Fn(&str, &McpServerConfig) -> Result<Arc<dyn ProtocolClient>> + Send + Sync,
{
    fn create(&self, name: &str, config: &McpServerConfig) -> Result<Arc<dyn ProtocolClient>> {
        self(name, config)
    }
}

/// Factory that builds `local` servers itself and delegates the rest.
#[derive(Default, Clone)]
pub struct DefaultClientFactory {
    transports: HashMap<McpTransportKind, Arc<dyn ClientFactory>>,
}

impl DefaultClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory used for `kind`. Replaces any earlier one.
    pub fn with_transport(mut self, kind: McpTransportKind, factory: Arc<dyn ClientFactory>) -> Self {
        self.transports.insert(kind, factory);
        self
    }

    /// Transport kinds this factory can build.
    pub fn supported(&self) -> Vec<McpTransportKind> {
        let mut kinds: Vec<_> = self.transports.keys().copied().collect();
        if !kinds.contains(&McpTransportKind::Local) {
            kinds.push(McpTransportKind::Local);
        }
        kinds.sort_by_key(|k| k.to_string());
        kinds
    }
}

impl ClientFactory for DefaultClientFactory {
    fn create(&self, name: &str, config: &McpServerConfig) -> Result<Arc<dyn ProtocolClient>> {
        if let Some(factory) = self.transports.get(&config.transport) {
            return factory.create(name, config);
        }
        match config.transport {
            McpTransportKind::Local => Ok(Arc::new(LocalToolServer::unloaded())),
            kind => Err(HostError::Connection {
                server: name.to_string(),
                message: format!("no client available for transport '{}'", kind),
            }),
        }
    }
}

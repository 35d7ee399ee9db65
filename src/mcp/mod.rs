//! MCP (Model Context Protocol) client side.
//!
//! - [`ProtocolClient`]: one connection to one server
//! - [`ClientFactory`] / [`DefaultClientFactory`]: builds clients per transport kind
//! - [`ClientManager`]: registry, routing caches, gated tool execution

mod client;
mod manager;
mod types;

#[cfg(test)]
pub use client::MockProtocolClient;
pub use client::{ClientFactory, DefaultClientFactory, ProtocolClient};
pub use manager::ClientManager;
pub use types::{result_text, ClientId, ClientState, ClientStatus, ToolDefinition, ToolSet};

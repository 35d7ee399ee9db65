//! mcphost - agent host runtime for MCP tool servers
//!
//! Connects to a set of MCP servers, routes the model's tool calls to the
//! server that owns each tool behind a confirmation gate, and keeps each
//! session's conversation inside the model's token budget.

pub mod agent;
pub mod approval;
pub mod bus;
pub mod config;
pub mod context;
pub mod error;
pub mod mcp;
pub mod providers;
pub mod session;
pub mod storage;
pub mod tools;
pub mod utils;

pub use agent::{Agent, AgentOptions};
pub use bus::{AgentEvent, EventBus};
pub use config::Config;
pub use context::ContextManager;
pub use error::{HostError, Result};
pub use mcp::{ClientManager, ProtocolClient, ToolDefinition, ToolSet};
pub use providers::{ChatOptions, LlmGateway, MessageFormatter};
pub use session::{Message, Role, ToolCall};

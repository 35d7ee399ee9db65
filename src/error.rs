//! Error types for mcphost
//!
//! This module defines all error types used throughout the host runtime.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! The variants follow the failure taxonomy of the two core subsystems:
//! per-server connection failures are aggregated by the client manager and
//! only escalate when the strict/lenient threshold is missed, while tool
//! lookup, denial and execution failures always reach the immediate caller.

use thiserror::Error;

use crate::config::InitMode;

/// The primary error type for mcphost operations.
#[derive(Error, Debug)]
pub enum HostError {
    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single protocol server failed to connect or failed discovery.
    #[error("Connection error ({server}): {message}")]
    Connection {
        /// Registry name of the server
        server: String,
        /// Human-readable cause
        message: String,
    },

    /// Too few servers connected during initialization.
    ///
    /// The display string concatenates every per-server failure message.
    #[error(
        "Initialization failed ({mode} mode): {connected}/{configured} servers connected: {}",
        failures.join("; ")
    )]
    InitializationFailed {
        /// Servers that reached `Connected`
        connected: usize,
        /// Enabled servers that were attempted
        configured: usize,
        /// Threshold mode that was applied
        mode: InitMode,
        /// One message per failed server
        failures: Vec<String>,
    },

    /// Execution requested for a tool name absent from the routing cache.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The confirmation gate rejected the call. No transport call was made.
    #[error("Tool execution denied: {0}")]
    ToolExecutionDenied(String),

    /// The owning client's `call_tool` failed (transport or remote-side error).
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution {
        /// Tool name as routed
        tool: String,
        /// Error reported by the client, verbatim
        message: String,
    },

    /// Prompt name absent from the routing cache.
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// Resource URI absent from the routing cache.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// The server does not offer a capability (prompts, resources).
    #[error("Capability not supported: {0}")]
    CapabilityUnsupported(String),

    /// No max-input-token budget is known for the provider/model pair.
    #[error("Cannot resolve token budget for {provider}/{model}; set context.max_input_tokens")]
    TokenBudgetUnresolvable {
        /// Provider family
        provider: String,
        /// Model identifier
        model: String,
    },

    /// Wire payload could not be built or parsed by a message formatter.
    #[error("Format error: {0}")]
    Format(String),

    /// Storage backend failures.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The LLM gateway failed or ended a stream without a response.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// MCP protocol errors (discovery, malformed server replies, etc.)
    #[error("MCP error: {0}")]
    Mcp(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HostError {
    /// Returns `true` if this error came from the confirmation gate.
    pub fn is_denied(&self) -> bool {
        matches!(self, HostError::ToolExecutionDenied(_))
    }

    /// Returns `true` if repeating the same request could succeed.
    ///
    /// Denials, unknown names and budget errors are deterministic and must
    /// not be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HostError::Connection { .. }
                | HostError::ToolExecution { .. }
                | HostError::Gateway(_)
                | HostError::Io(_)
        )
    }
}

/// A specialized `Result` type for mcphost operations.
pub type Result<T> = std::result::Result<T, HostError>;

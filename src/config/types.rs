//! Configuration type definitions for mcphost
//!
//! This module defines all configuration structs used throughout the host.
//! All types implement serde traits for JSON serialization and have sensible defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Main configuration struct for mcphost
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Protocol server definitions and initialization mode
    pub mcp: McpConfig,
    /// Provider, model and token budget for the context manager
    pub context: ContextConfig,
    /// Tool confirmation policy
    pub approval: ApprovalConfig,
    /// Agent event bus settings
    pub events: EventsConfig,
    /// Turn loop defaults
    pub agent: AgentDefaults,
    /// Logging output
    pub logging: LoggingConfig,
}

// ============================================================================
// MCP Configuration
// ============================================================================

/// How many servers must connect for initialization to succeed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMode {
    /// Every enabled server must connect.
    Strict,
    /// At least one enabled server must connect.
    #[default]
    Lenient,
}

impl fmt::Display for InitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitMode::Strict => write!(f, "strict"),
            InitMode::Lenient => write!(f, "lenient"),
        }
    }
}

impl std::str::FromStr for InitMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(InitMode::Strict),
            "lenient" => Ok(InitMode::Lenient),
            other => Err(format!("unknown init mode '{}'", other)),
        }
    }
}

/// MCP (Model Context Protocol) server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Threshold applied by `ClientManager::initialize`.
    pub mode: InitMode,
    /// MCP server definitions.
    pub servers: Vec<McpServerConfig>,
}

/// Transport family a server is reached through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpTransportKind {
    /// Child process speaking over stdin/stdout.
    #[default]
    Stdio,
    /// Server-sent events endpoint.
    Sse,
    /// Streamable HTTP endpoint.
    Http,
    /// In-process server built from a tool manifest directory.
    Local,
}

impl fmt::Display for McpTransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            McpTransportKind::Stdio => "stdio",
            McpTransportKind::Sse => "sse",
            McpTransportKind::Http => "http",
            McpTransportKind::Local => "local",
        };
        f.write_str(s)
    }
}

/// Configuration for a single MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Registry name. Unique across the manager.
    pub name: String,
    /// Transport kind (default: stdio).
    #[serde(default)]
    pub transport: McpTransportKind,
    /// Executable for stdio servers.
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments passed to `command`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the child process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Endpoint for sse/http servers.
    #[serde(default)]
    pub url: Option<String>,
    /// Manifest directory for local servers.
    #[serde(default)]
    pub directory: Option<String>,
    /// Connect timeout in seconds. `0` (the default) leaves timing to the client.
    #[serde(default)]
    pub timeout_secs: u64,
    /// Disabled servers are skipped and excluded from the thresholds.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl McpServerConfig {
    /// Minimal config for a named server of the given kind.
    pub fn new(name: impl Into<String>, transport: McpTransportKind) -> Self {
        Self {
            name: name.into(),
            transport,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            url: None,
            directory: None,
            timeout_secs: 0,
            enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Context Configuration
// ============================================================================

/// LLM provider family. Selects the wire formatter and budget table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Openai,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::Openai),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// What happens to attachments the target model cannot accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentPolicy {
    /// Replace with a short text note naming the attachment.
    #[default]
    Placeholder,
    /// Remove silently.
    Drop,
}

/// Context manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Provider family.
    pub provider: ProviderKind,
    /// Model identifier.
    pub model: String,
    /// Explicit input budget. Wins over the built-in table.
    pub max_input_tokens: Option<usize>,
    /// Fixed token cost added per message.
    pub message_overhead: usize,
    /// Handling of unsupported attachments.
    pub attachment_policy: AttachmentPolicy,
    /// Output cap sent with each request.
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature sent with each request.
    pub temperature: Option<f32>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Openai,
            model: "gpt-4o".to_string(),
            max_input_tokens: None,
            message_overhead: 4,
            attachment_policy: AttachmentPolicy::Placeholder,
            max_output_tokens: Some(4096),
            temperature: None,
        }
    }
}

// ============================================================================
// Approval Configuration
// ============================================================================

/// Which confirmation policy the gate applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Consult the allowed-tools store, then the prompter.
    #[default]
    Prompt,
    /// Approve every call.
    AutoApprove,
    /// Deny every call.
    AutoDeny,
}

/// Tool approval configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Gate policy.
    pub mode: ApprovalMode,
    /// Tool names pre-approved in the global scope.
    pub always_allow: Vec<String>,
}

// ============================================================================
// Events / Agent Configuration
// ============================================================================

/// Event bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Events retained per subscriber before the oldest are dropped.
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// Turn loop defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    /// Upper bound on model round-trips per user turn.
    pub max_tool_iterations: u32,
    /// Request streamed responses from the gateway.
    pub stream: bool,
    /// Base system prompt.
    pub system_prompt: Option<String>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            max_tool_iterations: 10,
            stream: false,
            system_prompt: None,
        }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// Compact single-line output with a `component` field
    #[default]
    Component,
    /// JSON lines
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Append logs to this file instead of stderr.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let cfg: McpServerConfig = serde_json::from_str(r#"{"name":"fs"}"#).unwrap();
        assert_eq!(cfg.name, "fs");
        assert_eq!(cfg.transport, McpTransportKind::Stdio);
        assert_eq!(cfg.timeout_secs, 0);
        assert!(cfg.enabled);
        assert!(cfg.args.is_empty());
    }

    #[test]
    fn test_server_config_local_deserialize() {
        let cfg: McpServerConfig = serde_json::from_str(
            r#"{"name":"tools","transport":"local","directory":"/opt/tools","enabled":false}"#,
        )
        .unwrap();
        assert_eq!(cfg.transport, McpTransportKind::Local);
        assert_eq!(cfg.directory.as_deref(), Some("/opt/tools"));
        assert!(!cfg.enabled);
    }

    #[test]
    fn test_mcp_config_mode_defaults_lenient() {
        let cfg: McpConfig = serde_json::from_str(r#"{"servers":[]}"#).unwrap();
        assert_eq!(cfg.mode, InitMode::Lenient);
        let strict: McpConfig = serde_json::from_str(r#"{"mode":"strict"}"#).unwrap();
        assert_eq!(strict.mode, InitMode::Strict);
    }

    #[test]
    fn test_context_config_defaults() {
        let cfg = ContextConfig::default();
        assert_eq!(cfg.provider, ProviderKind::Openai);
        assert_eq!(cfg.message_overhead, 4);
        assert_eq!(cfg.attachment_policy, AttachmentPolicy::Placeholder);
        assert!(cfg.max_input_tokens.is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"context":{"provider":"anthropic","model":"claude-sonnet-4"}}"#)
                .unwrap();
        assert_eq!(cfg.context.provider, ProviderKind::Anthropic);
        assert_eq!(cfg.context.message_overhead, 4);
        assert_eq!(cfg.events.capacity, 256);
        assert_eq!(cfg.agent.max_tool_iterations, 10);
        assert_eq!(cfg.approval.mode, ApprovalMode::Prompt);
    }

    #[test]
    fn test_approval_mode_snake_case() {
        let cfg: ApprovalConfig =
            serde_json::from_str(r#"{"mode":"auto_approve","always_allow":["read_file"]}"#)
                .unwrap();
        assert_eq!(cfg.mode, ApprovalMode::AutoApprove);
        assert_eq!(cfg.always_allow, vec!["read_file".to_string()]);
    }

    #[test]
    fn test_provider_kind_from_str_aliases() {
        assert_eq!("claude".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert!("bedrock".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_init_mode_display() {
        assert_eq!(InitMode::Strict.to_string(), "strict");
        assert_eq!(InitMode::Lenient.to_string(), "lenient");
    }
}

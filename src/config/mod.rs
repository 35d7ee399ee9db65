//! Configuration management for mcphost
//!
//! This module provides configuration loading and validation.
//! Configuration is loaded from `~/.mcphost/config.json` with environment variable overrides.

mod types;

pub use types::*;

use crate::error::{HostError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

impl Config {
    /// Returns the mcphost configuration directory path (~/.mcphost)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mcphost")
    }

    /// Returns the path to the config file (~/.mcphost/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// A `.env` file in the working directory is read first. If the config
    /// file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        if dotenvy::dotenv().is_ok() {
            debug!("Loaded .env file");
        }
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables follow the pattern: MCPHOST_SECTION_KEY
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MCPHOST_CONTEXT_MODEL") {
            self.context.model = val;
        }
        if let Ok(val) = std::env::var("MCPHOST_CONTEXT_PROVIDER") {
            if let Ok(v) = val.parse() {
                self.context.provider = v;
            }
        }
        if let Ok(val) = std::env::var("MCPHOST_CONTEXT_MAX_INPUT_TOKENS") {
            if let Ok(v) = val.parse() {
                self.context.max_input_tokens = Some(v);
            }
        }
        if let Ok(val) = std::env::var("MCPHOST_AGENT_MAX_TOOL_ITERATIONS") {
            if let Ok(v) = val.parse() {
                self.agent.max_tool_iterations = v;
            }
        }
        if let Ok(val) = std::env::var("MCPHOST_MCP_MODE") {
            if let Ok(v) = val.parse() {
                self.mcp.mode = v;
            }
        }
        if let Ok(val) = std::env::var("MCPHOST_LOGGING_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Reject configurations the runtime cannot honour.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for server in &self.mcp.servers {
            if server.name.trim().is_empty() {
                return Err(HostError::Config("MCP server name must not be empty".into()));
            }
            if !seen.insert(server.name.as_str()) {
                return Err(HostError::Config(format!(
                    "Duplicate MCP server name '{}'",
                    server.name
                )));
            }
            if !server.enabled {
                continue;
            }
            match server.transport {
                McpTransportKind::Stdio if server.command.is_none() => {
                    return Err(HostError::Config(format!(
                        "MCP server '{}' uses stdio but has no command",
                        server.name
                    )));
                }
                McpTransportKind::Sse | McpTransportKind::Http if server.url.is_none() => {
                    return Err(HostError::Config(format!(
                        "MCP server '{}' uses {} but has no url",
                        server.name, server.transport
                    )));
                }
                McpTransportKind::Local if server.directory.is_none() => {
                    return Err(HostError::Config(format!(
                        "MCP server '{}' is local but has no directory",
                        server.name
                    )));
                }
                _ => {}
            }
        }
        if self.context.model.trim().is_empty() {
            return Err(HostError::Config("context.model must not be empty".into()));
        }
        if self.events.capacity == 0 {
            return Err(HostError::Config("events.capacity must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_dir() {
        assert!(Config::dir().ends_with(".mcphost"));
        assert!(Config::path().ends_with("config.json"));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let config = Config::load_from_path(Path::new("/nonexistent/mcphost.json")).unwrap();
        assert!(config.mcp.servers.is_empty());
        assert_eq!(config.context.message_overhead, 4);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "mcp": {{
                    "mode": "strict",
                    "servers": [
                        {{"name": "fs", "command": "mcp-fs"}},
                        {{"name": "web", "transport": "http", "url": "http://localhost:9000"}}
                    ]
                }},
                "context": {{"provider": "gemini", "model": "gemini-1.5-pro"}}
            }}"#
        )
        .unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.mcp.mode, InitMode::Strict);
        assert_eq!(config.mcp.servers.len(), 2);
        assert_eq!(config.mcp.servers[1].transport, McpTransportKind::Http);
        assert_eq!(config.context.provider, ProviderKind::Gemini);
    }

    #[test]
    fn test_load_invalid_json_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = Config::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, HostError::Json(_)));
    }

    #[test]
    fn test_validate_duplicate_server_names() {
        let mut config = Config::default();
        let mut a = McpServerConfig::new("dup", McpTransportKind::Stdio);
        a.command = Some("x".into());
        config.mcp.servers = vec![a.clone(), a];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate MCP server name 'dup'"));
    }

    #[test]
    fn test_validate_missing_transport_fields() {
        let mut config = Config::default();
        config.mcp.servers = vec![McpServerConfig::new("web", McpTransportKind::Sse)];
        assert!(config.validate().unwrap_err().to_string().contains("no url"));

        config.mcp.servers = vec![McpServerConfig::new("local", McpTransportKind::Local)];
        assert!(config.validate().unwrap_err().to_string().contains("no directory"));
    }

    #[test]
    fn test_validate_skips_disabled_servers() {
        let mut config = Config::default();
        let mut server = McpServerConfig::new("off", McpTransportKind::Stdio);
        server.enabled = false;
        config.mcp.servers = vec![server];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_event_capacity() {
        let mut config = Config::default();
        config.events.capacity = 0;
        assert!(config.validate().is_err());
    }
}

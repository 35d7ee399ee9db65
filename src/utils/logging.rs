//! Logging initialization for mcphost.
//!
//! Supports three formats:
//! - `pretty`: multi-line human-readable output
//! - `component`: `[timestamp] [LEVEL] target message {fields}`, compact and grep-friendly;
//!   use the [`log_component!`] macro to add a `component` field for per-subsystem filtering
//! - `json`: structured JSON lines for log aggregators

use std::fs::OpenOptions;
use std::sync::Arc;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::Result;

/// Initialize the global tracing subscriber from config.
///
/// Falls back to `RUST_LOG` env var; if unset, uses `cfg.level`.
/// A second call is a no-op: the first installed subscriber stays active.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    let file = match &cfg.file {
        Some(path) => Some(Arc::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    // try_init only fails when a global subscriber already exists.
    let _ = match (cfg.format, file) {
        (LogFormat::Json, Some(file)) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(file)
            .try_init(),
        (LogFormat::Json, None) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        (LogFormat::Pretty, Some(file)) => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(file)
            .try_init(),
        (LogFormat::Pretty, None) => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .try_init(),
        (LogFormat::Component, Some(file)) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .compact()
            .with_writer(file)
            .try_init(),
        (LogFormat::Component, None) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .try_init(),
    };

    Ok(())
}

/// Emit a component-tagged tracing event.
///
/// Works with any tracing level (`trace`, `debug`, `info`, `warn`, `error`).
///
/// ```
/// # use mcphost::log_component;
/// log_component!(info, "mcp", "server connected");
/// log_component!(warn, "context", "history evicted", evicted = 12usize, budget = 4000usize);
/// ```
#[macro_export]
macro_rules! log_component {
    ($level:ident, $component:expr, $msg:expr) => {
        tracing::$level!(component = $component, $msg)
    };
    ($level:ident, $component:expr, $msg:expr, $($key:ident = $val:expr),+ $(,)?) => {
        tracing::$level!(component = $component, $($key = $val,)+ $msg)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_config() {
        let cfg = LoggingConfig::default();
        assert_eq!(cfg.format, LogFormat::Component);
        assert_eq!(cfg.level, "info");
        assert!(cfg.file.is_none());
    }

    #[test]
    fn test_log_format_deserialize() {
        let cfg: LoggingConfig =
            serde_json::from_str(r#"{"format":"json","level":"debug"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level, "debug");

        let cfg: LoggingConfig = serde_json::from_str(r#"{"format":"pretty"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Pretty);
        assert_eq!(cfg.level, "info");
    }

    #[test]
    fn test_init_logging_twice_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            format: LogFormat::Json,
            level: "debug".into(),
            file: Some(dir.path().join("host.log").to_string_lossy().into_owned()),
        };
        assert!(init_logging(&cfg).is_ok());
        assert!(init_logging(&LoggingConfig::default()).is_ok());
        assert!(dir.path().join("host.log").exists());
    }

    #[test]
    fn test_init_logging_bad_file_path() {
        let cfg = LoggingConfig {
            file: Some("/nonexistent-dir/mcphost/host.log".into()),
            ..Default::default()
        };
        assert!(init_logging(&cfg).is_err());
    }
}

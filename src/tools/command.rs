//! Shell command tools.
//!
//! A [`CommandTool`] wraps one [`CommandToolDef`] from a tool manifest. On
//! execution it interpolates `{{param_name}}` placeholders with shell-escaped
//! argument values, runs the result through `sh -c` and returns stdout.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HostError, Result};

use super::types::{CommandToolDef, Tool};

/// Wrap `value` in single quotes, escaping embedded quotes as `'\''`.
fn shell_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            escaped.push_str("'\\''");
        } else {
            escaped.push(ch);
        }
    }
    escaped.push('\'');
    escaped
}

/// A tool that runs a shell command template.
pub struct CommandTool {
    def: CommandToolDef,
    /// Manifest the tool came from (for logging).
    source: String,
    /// Fallback working directory: the manifest's own directory.
    base_dir: Option<PathBuf>,
}

impl CommandTool {
    pub fn new(def: CommandToolDef, source: &str) -> Self {
        Self {
            def,
            source: source.to_string(),
            base_dir: None,
        }
    }

    /// Run in `dir` when the definition has no `working_dir`.
    pub fn with_base_dir(mut self, dir: PathBuf) -> Self {
        self.base_dir = Some(dir);
        self
    }

    /// Single pass over the template. Substituted values are never rescanned,
    /// so a value containing `{{other}}` stays inside its quotes.
    fn interpolate(command: &str, args: &Value) -> String {
        let mut result = String::with_capacity(command.len());
        let mut rest = command;
        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                result.push_str(&rest[start..]);
                return result;
            };
            let key = &after[..end];
            match args.get(key) {
                Some(value) => {
                    let raw = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    result.push_str(&shell_escape(&raw));
                }
                None => {
                    result.push_str("{{");
                    result.push_str(key);
                    result.push_str("}}");
                }
            }
            rest = &after[end + 2..];
        }
        result.push_str(rest);
        result
    }
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn description(&self) -> &str {
        &self.def.description
    }

    fn parameters(&self) -> Value {
        self.def.parameters.clone()
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let command = Self::interpolate(&self.def.command, &args);
        let timeout = Duration::from_secs(self.def.effective_timeout());

        tracing::debug!(
            source = %self.source,
            tool = %self.def.name,
            command = %command,
            "Executing command tool"
        );

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(&command).kill_on_drop(true);
        if let Some(ref wd) = self.def.working_dir {
            cmd.current_dir(wd);
        } else if let Some(ref dir) = self.base_dir {
            cmd.current_dir(dir);
        }
        if let Some(ref env_vars) = self.def.env {
            cmd.envs(env_vars);
        }

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| HostError::ToolExecution {
                tool: self.def.name.clone(),
                message: format!("timed out after {}s", timeout.as_secs()),
            })?
            .map_err(|e| HostError::ToolExecution {
                tool: self.def.name.clone(),
                message: format!("failed to spawn: {}", e),
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        Err(HostError::ToolExecution {
            tool: self.def.name.clone(),
            message: format!(
                "exit {}: {}{}",
                output.status.code().unwrap_or(-1),
                stderr.trim_end(),
                if stdout.is_empty() {
                    String::new()
                } else {
                    format!("\nstdout: {}", stdout.trim_end())
                }
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn def(command: &str) -> CommandToolDef {
        CommandToolDef {
            name: "test_tool".to_string(),
            description: "A test tool".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
            command: command.to_string(),
            working_dir: None,
            timeout_secs: Some(5),
            env: None,
        }
    }

    #[test]
    fn test_shell_escape() {
        assert_eq!(shell_escape("hello"), "'hello'");
        assert_eq!(shell_escape("it's"), "'it'\\''s'");
        assert_eq!(shell_escape("$(rm -rf /)"), "'$(rm -rf /)'");
        assert_eq!(shell_escape("foo; rm -rf /"), "'foo; rm -rf /'");
    }

    #[test]
    fn test_interpolate() {
        let args = json!({"path": "/tmp/repo", "count": 5});
        assert_eq!(
            CommandTool::interpolate("git -C {{path}} log -{{count}}", &args),
            "git -C '/tmp/repo' log -'5'"
        );
        // unknown placeholders are left alone
        assert_eq!(
            CommandTool::interpolate("echo {{missing}}", &json!({})),
            "echo {{missing}}"
        );
    }

    #[test]
    fn test_interpolate_does_not_rescan_values() {
        let args = json!({"a": "{{b}}", "b": "; touch /tmp/x; "});
        assert_eq!(CommandTool::interpolate("echo {{a}}", &args), "echo '{{b}}'");
        assert_eq!(
            CommandTool::interpolate("echo {{a}} {{b}}", &args),
            "echo '{{b}}' '; touch /tmp/x; '"
        );
        assert_eq!(CommandTool::interpolate("echo {{open", &args), "echo {{open");
    }

    #[tokio::test]
    async fn test_execute_nested_placeholder_value_stays_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("injected");
        let tool = CommandTool::new(def("echo {{a}}"), "test");
        let out = tool
            .execute(json!({
                "a": "{{b}}",
                "b": format!("; touch {}; ", marker.display()),
            }))
            .await
            .unwrap();
        assert_eq!(out.trim(), "{{b}}");
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_execute_with_interpolation() {
        let tool = CommandTool::new(def("echo {{msg}}"), "test");
        let out = tool.execute(json!({"msg": "greetings"})).await.unwrap();
        assert_eq!(out.trim(), "greetings");
    }

    #[tokio::test]
    async fn test_execute_blocks_command_injection() {
        let tool = CommandTool::new(def("echo {{input}}"), "test");
        let out = tool
            .execute(json!({"input": "$(echo INJECTED)"}))
            .await
            .unwrap();
        assert_eq!(out.trim(), "$(echo INJECTED)");
    }

    #[tokio::test]
    async fn test_execute_failure_reports_exit_code() {
        let tool = CommandTool::new(def("echo oops >&2; exit 3"), "test");
        let err = tool.execute(json!({})).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("exit 3"), "{}", text);
        assert!(text.contains("oops"), "{}", text);
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let mut d = def("sleep 5");
        d.timeout_secs = Some(1);
        let tool = CommandTool::new(d, "test");
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(err.to_string().contains("timed out after 1s"));
    }

    #[tokio::test]
    async fn test_execute_with_env_and_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = HashMap::new();
        env.insert("MY_VAR".to_string(), "test_value".to_string());
        let mut d = def("echo $MY_VAR; pwd");
        d.env = Some(env);
        let tool = CommandTool::new(d, "test").with_base_dir(dir.path().to_path_buf());
        let out = tool.execute(json!({})).await.unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("test_value"));
        let pwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
        assert_eq!(pwd, std::fs::canonicalize(dir.path()).unwrap());
    }
}

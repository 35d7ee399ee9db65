//! System prompt composition.
//!
//! The context manager asks a [`PromptComposer`] for the system prompt each
//! time it prepares a request and treats the answer as opaque text.
//! [`SystemPromptBuilder`] is the stock composer: a base prompt followed
//! by an optional `## Runtime Context` section.

use async_trait::async_trait;

use crate::error::Result;

/// Default system prompt for mcphost agents
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful assistant connected to external tools through MCP servers.

Use the available tools when they help answer the request. Be concise."#;

/// Supplies the current system prompt for a session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PromptComposer: Send + Sync {
    async fn compose(&self, session_id: &str) -> Result<String>;
}

/// Environment details appended to the system prompt.
///
/// Time is rendered at compose time, not at construction.
///
/// # Example
///
/// ```rust
/// use mcphost::context::RuntimeContext;
///
/// let ctx = RuntimeContext::new()
///     .with_tools(vec!["read_file".to_string(), "search".to_string()])
///     .with_os_info();
///
/// let rendered = ctx.render("s1").unwrap();
/// assert!(rendered.contains("read_file, search"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    /// Names of available tools
    pub available_tools: Vec<String>,
    /// Render the current UTC time
    pub current_time: bool,
    /// Render the session id
    pub session: bool,
    /// OS/platform info (e.g., "linux x86_64")
    pub os_info: Option<String>,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.available_tools = tools;
        self
    }

    pub fn with_current_time(mut self) -> Self {
        self.current_time = true;
        self
    }

    pub fn with_session(mut self) -> Self {
        self.session = true;
        self
    }

    /// Set the OS/platform info from the current environment.
    pub fn with_os_info(mut self) -> Self {
        self.os_info = Some(format!(
            "{} {}",
            std::env::consts::OS,
            std::env::consts::ARCH
        ));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.available_tools.is_empty()
            && !self.current_time
            && !self.session
            && self.os_info.is_none()
    }

    /// Render as a markdown section, or `None` when nothing is set.
    pub fn render(&self, session_id: &str) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut parts = Vec::new();
        if !self.available_tools.is_empty() {
            parts.push(format!(
                "- Available tools: {}",
                self.available_tools.join(", ")
            ));
        }
        if self.current_time {
            parts.push(format!("- Current time: {}", chrono::Utc::now().to_rfc3339()));
        }
        if self.session {
            parts.push(format!("- Session: {}", session_id));
        }
        if let Some(ref os) = self.os_info {
            parts.push(format!("- Platform: {}", os));
        }

        Some(format!("## Runtime Context\n\n{}", parts.join("\n")))
    }
}

/// Base prompt plus optional runtime context.
#[derive(Debug, Clone)]
pub struct SystemPromptBuilder {
    base: String,
    runtime_context: Option<RuntimeContext>,
}

impl SystemPromptBuilder {
    /// Builder with [`DEFAULT_SYSTEM_PROMPT`].
    pub fn new() -> Self {
        Self {
            base: DEFAULT_SYSTEM_PROMPT.to_string(),
            runtime_context: None,
        }
    }

    /// Replace the base prompt. An empty prompt is allowed.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.base = prompt.to_string();
        self
    }

    pub fn with_runtime_context(mut self, ctx: RuntimeContext) -> Self {
        self.runtime_context = Some(ctx);
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Render for one session.
    pub fn build(&self, session_id: &str) -> String {
        let rendered = self
            .runtime_context
            .as_ref()
            .and_then(|ctx| ctx.render(session_id));
        match rendered {
            Some(section) if self.base.is_empty() => section,
            Some(section) => format!("{}\n\n{}", self.base, section),
            None => self.base.clone(),
        }
    }
}

impl Default for SystemPromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PromptComposer for SystemPromptBuilder {
    async fn compose(&self, session_id: &str) -> Result<String> {
        Ok(self.build(session_id))
    }
}

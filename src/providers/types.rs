//! Formatter types for mcphost
//!
//! This module defines the `MessageFormatter` trait that turns the
//! provider-neutral history into one provider's request body, plus the
//! generation options shared by every formatter.

use serde_json::Value;

use crate::config::{ContextConfig, ProviderKind};
use crate::error::Result;
use crate::mcp::ToolSet;
use crate::session::Message;

/// Translates between internal messages and one provider's wire shape.
///
/// Formatters are pure: they never perform I/O and never mutate the
/// history they are given. Sending the payload is the gateway's job.
pub trait MessageFormatter: Send + Sync {
    /// Provider this formatter targets.
    fn provider(&self) -> ProviderKind;

    /// Model identifier written into (or implied by) the payload.
    fn model(&self) -> &str;

    /// Build the request body.
    ///
    /// # Arguments
    /// * `messages` - History already trimmed and filtered for this model
    /// * `system_prompt` - Composed system prompt; empty means none
    /// * `tools` - Tools the model may call
    fn format(&self, messages: &[Message], system_prompt: &str, tools: &ToolSet) -> Result<Value>;

    /// Parse a provider response into zero or more internal messages.
    fn parse_response(&self, response: &Value) -> Result<Vec<Message>>;
}

/// Options for chat completion requests.
///
/// Use the builder pattern to construct options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter
    pub top_p: Option<f32>,
    /// Stop sequences that halt generation
    pub stop: Option<Vec<String>>,
}

impl ChatOptions {
    /// Create new default chat options.
    ///
    /// # Example
    /// ```
    /// use mcphost::providers::ChatOptions;
    ///
    /// let options = ChatOptions::new();
    /// assert!(options.max_tokens.is_none());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Options carried by the context section of the config.
    pub fn from_context(config: &ContextConfig) -> Self {
        Self {
            max_tokens: config.max_output_tokens,
            temperature: config.temperature,
            ..Self::default()
        }
    }

    /// Set the maximum number of tokens to generate.
    ///
    /// # Example
    /// ```
    /// use mcphost::providers::ChatOptions;
    ///
    /// let options = ChatOptions::new().with_max_tokens(1000);
    /// assert_eq!(options.max_tokens, Some(1000));
    /// ```
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    ///
    /// Lower values (e.g., 0.2) make output more focused and deterministic.
    /// Higher values (e.g., 0.8) make output more creative and diverse.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the top_p (nucleus sampling) parameter.
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set stop sequences that will halt generation.
    ///
    /// # Example
    /// ```
    /// use mcphost::providers::ChatOptions;
    ///
    /// let options = ChatOptions::new().with_stop(vec!["END".to_string()]);
    /// assert!(options.stop.is_some());
    /// ```
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }
}

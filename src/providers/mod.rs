//! Providers module - message formatters and the LLM gateway contract
//!
//! Each provider family (OpenAI, Anthropic, Gemini) has a
//! [`MessageFormatter`] that maps the provider-neutral history onto that
//! provider's request body and parses its responses back. Sending the
//! payload is delegated to an [`LlmGateway`].
//!
//! # Example
//!
//! ```
//! use mcphost::config::ProviderKind;
//! use mcphost::mcp::ToolSet;
//! use mcphost::providers::{formatter_for, ChatOptions};
//! use mcphost::session::Message;
//!
//! let formatter = formatter_for(ProviderKind::Anthropic, "claude-sonnet-4-5", ChatOptions::new());
//! let payload = formatter
//!     .format(&[Message::user("Hello!")], "You are helpful.", &ToolSet::new())
//!     .unwrap();
//! assert_eq!(payload["system"], "You are helpful.");
//! ```

mod binary;
pub mod claude;
mod gateway;
pub mod gemini;
pub mod openai;
mod types;

use crate::config::ProviderKind;

pub use binary::{extract_binary_as_base64_or_url, BinaryPayload};
pub use claude::AnthropicFormatter;
#[cfg(test)]
pub use gateway::MockLlmGateway;
pub use gateway::{GatewayEvent, LlmGateway};
pub use gemini::GeminiFormatter;
pub use openai::OpenAiFormatter;
pub use types::{ChatOptions, MessageFormatter};

/// Build the formatter for a provider family.
pub fn formatter_for(
    provider: ProviderKind,
    model: &str,
    options: ChatOptions,
) -> Box<dyn MessageFormatter> {
    match provider {
        ProviderKind::Openai => Box::new(OpenAiFormatter::new(model, options)),
        ProviderKind::Anthropic => Box::new(AnthropicFormatter::new(model, options)),
        ProviderKind::Gemini => Box::new(GeminiFormatter::new(model, options)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatter_for_each_provider() {
        for kind in [
            ProviderKind::Openai,
            ProviderKind::Anthropic,
            ProviderKind::Gemini,
        ] {
            let f = formatter_for(kind, "some-model", ChatOptions::new());
            assert_eq!(f.provider(), kind);
            assert_eq!(f.model(), "some-model");
        }
    }
}

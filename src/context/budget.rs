//! Input token budget resolution.

use once_cell::sync::Lazy;

use crate::config::ProviderKind;
use crate::error::{HostError, Result};

/// Known input windows as `(provider, model prefix, tokens)`.
///
/// Lookup picks the longest matching prefix, so specific entries can sit
/// next to family-wide ones.
static CONTEXT_WINDOWS: Lazy<Vec<(ProviderKind, &'static str, usize)>> = Lazy::new(|| {
    use ProviderKind::*;
    vec![
        (Openai, "gpt-3.5-turbo", 16_385),
        (Openai, "gpt-4", 8_192),
        (Openai, "gpt-4-32k", 32_768),
        (Openai, "gpt-4-turbo", 128_000),
        (Openai, "gpt-4o", 128_000),
        (Openai, "gpt-4.1", 1_047_576),
        (Openai, "gpt-5", 400_000),
        (Openai, "o1", 200_000),
        (Openai, "o3", 200_000),
        (Openai, "o4-mini", 200_000),
        (Anthropic, "claude-2", 100_000),
        (Anthropic, "claude-3", 200_000),
        (Anthropic, "claude-sonnet-4", 200_000),
        (Anthropic, "claude-opus-4", 200_000),
        (Anthropic, "claude-haiku-4", 200_000),
        (Gemini, "gemini-1.0-pro", 32_760),
        (Gemini, "gemini-1.5-flash", 1_048_576),
        (Gemini, "gemini-1.5-pro", 2_097_152),
        (Gemini, "gemini-2", 1_048_576),
    ]
});

/// Effective maximum input tokens for one provider/model pair.
///
/// Resolved once per context manager and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget(usize);

impl TokenBudget {
    /// Resolve the budget. An explicit override always wins.
    ///
    /// # Example
    /// ```
    /// use mcphost::config::ProviderKind;
    /// use mcphost::context::TokenBudget;
    ///
    /// let budget = TokenBudget::resolve(ProviderKind::Openai, "gpt-4o-mini", None).unwrap();
    /// assert_eq!(budget.get(), 128_000);
    /// ```
    pub fn resolve(provider: ProviderKind, model: &str, max_input: Option<usize>) -> Result<Self> {
        if let Some(tokens) = max_input {
            return Ok(Self(tokens));
        }
        lookup(provider, model)
            .map(Self)
            .ok_or_else(|| HostError::TokenBudgetUnresolvable {
                provider: provider.to_string(),
                model: model.to_string(),
            })
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

fn lookup(provider: ProviderKind, model: &str) -> Option<usize> {
    let model = model.trim_start_matches("models/");
    CONTEXT_WINDOWS
        .iter()
        .filter(|(p, prefix, _)| *p == provider && model.starts_with(prefix))
        .max_by_key(|(_, prefix, _)| prefix.len())
        .map(|(_, _, tokens)| *tokens)
}

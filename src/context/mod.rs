//! Context Manager - one session's history, budget and wire translation
//!
//! The [`ContextManager`] persists every message through a
//! [`HistoryProvider`]. Before each request it filters out attachments the
//! model cannot accept, fits what is left into the model's [`TokenBudget`]
//! and hands the result to the provider's [`MessageFormatter`].
//!
//! Eviction never touches the persisted history: it only shapes the view
//! that is sent.

mod budget;
mod filter;
mod prompt;
mod tokenizer;

pub use budget::TokenBudget;
pub use filter::{filter_attachments, supports_mime};
#[cfg(test)]
pub use prompt::MockPromptComposer;
pub use prompt::{PromptComposer, RuntimeContext, SystemPromptBuilder, DEFAULT_SYSTEM_PROMPT};
pub use tokenizer::{HeuristicTokenizer, Tokenizer};

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::{AttachmentPolicy, ContextConfig, ProviderKind};
use crate::error::Result;
use crate::log_component;
use crate::mcp::ToolSet;
use crate::providers::{formatter_for, ChatOptions, MessageFormatter};
use crate::session::{BinarySource, ContentPart, HistoryProvider, Message, Role};

/// Bytes of encoded attachment data per estimated token.
const BINARY_BYTES_PER_TOKEN: usize = 1024;

/// A budget-fitted view of the history, ready for formatting.
#[derive(Debug, Clone)]
pub struct PreparedContext {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    /// Estimated tokens of the system prompt plus `messages`.
    pub total_tokens: usize,
    /// Messages left out of the view to meet the budget.
    pub evicted: usize,
    /// Attachment parts removed or replaced before costing.
    pub filtered: usize,
}

/// Owns one session's conversation.
pub struct ContextManager {
    session_id: String,
    history: Arc<dyn HistoryProvider>,
    composer: Arc<dyn PromptComposer>,
    formatter: Box<dyn MessageFormatter>,
    tokenizer: Arc<dyn Tokenizer>,
    budget: TokenBudget,
    message_overhead: usize,
    attachment_policy: AttachmentPolicy,
}

impl ContextManager {
    /// Build a manager for `session_id` from the context config.
    ///
    /// Fails with `TokenBudgetUnresolvable` when the model has no known
    /// window and `max_input_tokens` is unset.
    pub fn new(
        session_id: &str,
        config: &ContextConfig,
        history: Arc<dyn HistoryProvider>,
        composer: Arc<dyn PromptComposer>,
    ) -> Result<Self> {
        let budget = TokenBudget::resolve(config.provider, &config.model, config.max_input_tokens)?;
        debug!(
            session_id = %session_id,
            provider = %config.provider,
            model = %config.model,
            budget = budget.get(),
            "Context manager ready"
        );
        Ok(Self {
            session_id: session_id.to_string(),
            history,
            composer,
            formatter: formatter_for(
                config.provider,
                &config.model,
                ChatOptions::from_context(config),
            ),
            tokenizer: Arc::new(HeuristicTokenizer::default()),
            budget,
            message_overhead: config.message_overhead,
            attachment_policy: config.attachment_policy,
        })
    }

    /// Replace the token estimator.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Replace the wire formatter. The budget stays as resolved.
    pub fn with_formatter(mut self, formatter: Box<dyn MessageFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn provider(&self) -> ProviderKind {
        self.formatter.provider()
    }

    pub fn model(&self) -> &str {
        self.formatter.model()
    }

    /// Effective maximum input tokens.
    pub fn budget(&self) -> usize {
        self.budget.get()
    }

    /// Append one message to the persisted history.
    pub async fn append(&self, message: Message) -> Result<()> {
        self.history.append(&self.session_id, &message).await
    }

    /// Full persisted history, oldest first.
    pub async fn history(&self) -> Result<Vec<Message>> {
        self.history.load(&self.session_id).await
    }

    /// Drop the persisted history.
    pub async fn reset(&self) -> Result<()> {
        self.history.clear(&self.session_id).await
    }

    /// Estimated tokens for one message, overhead included.
    pub fn count_message_tokens(&self, message: &Message) -> usize {
        let parts: usize = message
            .parts()
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => self.tokenizer.count(text),
                ContentPart::Image { source, .. } | ContentPart::File { source, .. } => {
                    encoded_len(source).div_ceil(BINARY_BYTES_PER_TOKEN)
                }
            })
            .sum();
        let calls: usize = message
            .tool_calls
            .iter()
            .map(|tc| self.tokenizer.count(&tc.name) + self.tokenizer.count(&tc.arguments))
            .sum();
        parts + calls + self.message_overhead
    }

    fn count_system_prompt(&self, prompt: &str) -> usize {
        if prompt.is_empty() {
            0
        } else {
            self.tokenizer.count(prompt) + self.message_overhead
        }
    }

    /// Compose the system prompt and fit the history into the budget.
    ///
    /// Unsupported attachments are filtered first, so they cost nothing.
    /// Oldest non-system messages go first. The last user message and
    /// everything after it always stay, even when that alone exceeds the
    /// budget.
    pub async fn prepare_for_request(&self) -> Result<PreparedContext> {
        let system_prompt = self.composer.compose(&self.session_id).await?;
        let (messages, filtered) = filter_attachments(
            self.history().await?,
            self.formatter.provider(),
            self.formatter.model(),
            self.attachment_policy,
        );
        if filtered > 0 {
            debug!(
                model = %self.formatter.model(),
                filtered,
                "Unsupported attachments filtered"
            );
        }

        let system_cost = self.count_system_prompt(&system_prompt);
        let costs: Vec<usize> = messages
            .iter()
            .map(|m| self.count_message_tokens(m))
            .collect();
        let (messages, total_tokens, evicted) =
            fit_to_budget(messages, &costs, system_cost, self.budget.get());

        if evicted > 0 {
            log_component!(
                info,
                "context",
                "History trimmed to budget",
                session_id = self.session_id.as_str(),
                evicted = evicted,
                total_tokens = total_tokens,
                budget = self.budget.get()
            );
        }

        Ok(PreparedContext {
            system_prompt,
            messages,
            total_tokens,
            evicted,
            filtered,
        })
    }

    /// Build the provider payload for the next request.
    pub async fn format_for_provider(&self, tools: &ToolSet) -> Result<Value> {
        let prepared = self.prepare_for_request().await?;
        self.formatter
            .format(&prepared.messages, &prepared.system_prompt, tools)
    }

    /// Parse a provider response and append what it yields.
    ///
    /// Returns the appended messages in order.
    pub async fn ingest_response(&self, response: &Value) -> Result<Vec<Message>> {
        let messages = self.formatter.parse_response(response)?;
        for message in &messages {
            self.history.append(&self.session_id, message).await?;
        }
        Ok(messages)
    }
}

/// Length of the source once base64-encoded.
fn encoded_len(source: &BinarySource) -> usize {
    match source {
        BinarySource::Base64(data) => data.len(),
        BinarySource::Url(url) => url.len(),
        BinarySource::Bytes(bytes) => bytes.len().div_ceil(3) * 4,
    }
}

/// Evict from the head until `system_cost + Σcosts <= budget`.
///
/// Returns the kept messages, their total (system included) and the
/// number evicted. Evicting an assistant message also evicts the tool
/// results answering its calls, so no tool result is left without its
/// call.
fn fit_to_budget(
    messages: Vec<Message>,
    costs: &[usize],
    system_cost: usize,
    budget: usize,
) -> (Vec<Message>, usize, usize) {
    let mut total = system_cost + costs.iter().sum::<usize>();
    if total <= budget {
        return (messages, total, 0);
    }

    let protected_from = messages
        .iter()
        .rposition(|m| m.role == Role::User)
        .unwrap_or_else(|| messages.len().saturating_sub(1));

    let mut evicted = vec![false; messages.len()];
    let mut cursor = 0;
    while total > budget {
        let Some(idx) = (cursor..protected_from)
            .find(|&i| !evicted[i] && messages[i].role != Role::System)
        else {
            break;
        };
        cursor = idx + 1;
        evicted[idx] = true;
        total -= costs[idx];

        let call_ids: HashSet<&str> = messages[idx]
            .tool_calls
            .iter()
            .map(|tc| tc.id.as_str())
            .collect();
        if call_ids.is_empty() {
            continue;
        }
        for j in idx + 1..protected_from {
            let answers_call = messages[j].role == Role::Tool
                && messages[j]
                    .tool_call_id
                    .as_deref()
                    .is_some_and(|id| call_ids.contains(id));
            if answers_call && !evicted[j] {
                evicted[j] = true;
                total -= costs[j];
            }
        }
    }

    let evicted_count = evicted.iter().filter(|e| **e).count();
    let kept = messages
        .into_iter()
        .zip(evicted)
        .filter_map(|(m, gone)| (!gone).then_some(m))
        .collect();
    (kept, total, evicted_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{StorageHistory, ToolCall};
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn config(budget: usize) -> ContextConfig {
        ContextConfig {
            max_input_tokens: Some(budget),
            ..Default::default()
        }
    }

    fn manager_with(budget: usize, prompt: &str) -> ContextManager {
        let history = Arc::new(StorageHistory::new(Arc::new(MemoryStorage::new())));
        let composer = Arc::new(SystemPromptBuilder::new().with_system_prompt(prompt));
        ContextManager::new("s1", &config(budget), history, composer).unwrap()
    }

    #[test]
    fn test_unknown_model_without_override_fails() {
        let history = Arc::new(StorageHistory::new(Arc::new(MemoryStorage::new())));
        let cfg = ContextConfig {
            model: "mystery-1".into(),
            ..Default::default()
        };
        let result = ContextManager::new("s", &cfg, history, Arc::new(SystemPromptBuilder::new()));
        assert!(matches!(
            result,
            Err(crate::error::HostError::TokenBudgetUnresolvable { .. })
        ));
    }

    #[test]
    fn test_count_message_tokens() {
        let m = manager_with(1000, "");
        // 8 chars -> 2 tokens, plus overhead 4
        assert_eq!(m.count_message_tokens(&Message::user("abcdefgh")), 6);

        let image = Message::user_with_parts(vec![ContentPart::image(
            BinarySource::Base64("A".repeat(2048)),
            "image/png",
        )]);
        assert_eq!(m.count_message_tokens(&image), 2 + 4);

        let call = Message::assistant_with_tools("", vec![ToolCall::new("1", "abcd", "{}")]);
        assert_eq!(m.count_message_tokens(&call), 1 + 1 + 4);
    }

    #[test]
    fn test_encoded_len_of_bytes() {
        assert_eq!(encoded_len(&BinarySource::Bytes(vec![0; 3])), 4);
        assert_eq!(encoded_len(&BinarySource::Bytes(vec![0; 4])), 8);
    }

    #[tokio::test]
    async fn test_fitting_history_is_unchanged_and_idempotent() {
        let m = manager_with(10_000, "Be brief.");
        m.append(Message::user("hi")).await.unwrap();
        m.append(Message::assistant("hello")).await.unwrap();

        let first = m.prepare_for_request().await.unwrap();
        let second = m.prepare_for_request().await.unwrap();
        assert_eq!(first.evicted, 0);
        assert_eq!(first.messages, m.history().await.unwrap());
        assert_eq!(first.messages, second.messages);
        assert_eq!(first.total_tokens, second.total_tokens);
    }

    #[tokio::test]
    async fn test_eviction_keeps_system_and_latest_turn() {
        let m = manager_with(60, "");
        m.append(Message::system("pinned")).await.unwrap();
        for i in 0..10 {
            m.append(Message::user(&format!("question number {}", i)))
                .await
                .unwrap();
            m.append(Message::assistant(&format!("answer number {}", i)))
                .await
                .unwrap();
        }
        m.append(Message::user("final question")).await.unwrap();

        let prepared = m.prepare_for_request().await.unwrap();
        assert!(prepared.total_tokens <= 60);
        assert!(prepared.evicted > 0);
        assert!(prepared.messages[0].is_system());
        assert_eq!(prepared.messages.last().unwrap().text(), "final question");
        // persisted history untouched
        assert_eq!(m.history().await.unwrap().len(), 22);
    }

    #[tokio::test]
    async fn test_latest_turn_survives_over_budget() {
        let m = manager_with(5, "");
        m.append(Message::user("old")).await.unwrap();
        m.append(Message::user(&"x".repeat(400))).await.unwrap();

        let prepared = m.prepare_for_request().await.unwrap();
        assert_eq!(prepared.messages.len(), 1);
        assert!(prepared.total_tokens > 5);
    }

    #[test]
    fn test_eviction_takes_tool_results_with_their_call() {
        let messages = vec![
            Message::user("q1"),
            Message::assistant_with_tools("", vec![ToolCall::new("c1", "t", "{}")]),
            Message::tool_result("c1", "t", "r1"),
            Message::assistant("a1"),
            Message::user("q2"),
        ];
        let costs = vec![10; messages.len()];
        // evict q1 (40 left), then the call and its result together (20 left)
        let (kept, total, evicted) = fit_to_budget(messages, &costs, 0, 25);
        assert_eq!(evicted, 3);
        assert_eq!(total, 20);
        assert_eq!(kept[0].text(), "a1");
        assert!(kept.iter().all(|m| m.role != Role::Tool));
    }

    #[test]
    fn test_eviction_skips_system_in_the_middle() {
        let messages = vec![
            Message::user("q1"),
            Message::system("mid-conversation instruction"),
            Message::assistant("a1"),
            Message::user("q2"),
            Message::assistant("a2"),
            Message::user("q3"),
        ];
        let costs = vec![10; messages.len()];
        let (kept, total, evicted) = fit_to_budget(messages, &costs, 0, 25);
        assert_eq!(evicted, 4);
        assert_eq!(total, 20);
        assert!(kept[0].is_system());
        assert_eq!(kept[1].text(), "q3");
    }

    #[tokio::test]
    async fn test_unsupported_attachment_costs_nothing() {
        let cfg = ContextConfig {
            model: "gpt-3.5-turbo".into(),
            max_input_tokens: Some(200),
            attachment_policy: AttachmentPolicy::Drop,
            ..Default::default()
        };
        let history = Arc::new(StorageHistory::new(Arc::new(MemoryStorage::new())));
        let composer = Arc::new(SystemPromptBuilder::new().with_system_prompt(""));
        let m = ContextManager::new("s1", &cfg, history, composer).unwrap();
        for i in 0..5 {
            m.append(Message::user(&format!("q{}", i))).await.unwrap();
            m.append(Message::assistant(&format!("a{}", i))).await.unwrap();
        }
        m.append(Message::user_with_parts(vec![
            ContentPart::text("what is this?"),
            ContentPart::image(BinarySource::Base64("A".repeat(300 * 1024)), "image/png"),
        ]))
        .await
        .unwrap();

        let prepared = m.prepare_for_request().await.unwrap();
        assert_eq!(prepared.filtered, 1);
        assert_eq!(prepared.evicted, 0);
        assert_eq!(prepared.messages.len(), 11);
        assert!(prepared.total_tokens <= 200);

        let payload = m.format_for_provider(&ToolSet::new()).await.unwrap();
        assert_eq!(payload["messages"].as_array().unwrap().len(), 11);
    }

    #[test]
    fn test_eviction_never_grows_count() {
        let messages: Vec<Message> = (0..20).map(|i| Message::user(&i.to_string())).collect();
        let costs = vec![3; 20];
        for budget in [0, 1, 10, 30, 59, 60, 100] {
            let (kept, _, evicted) = fit_to_budget(messages.clone(), &costs, 0, budget);
            assert!(kept.len() <= 20);
            assert_eq!(kept.len() + evicted, 20);
        }
    }

    #[tokio::test]
    async fn test_format_and_ingest() {
        let m = manager_with(10_000, "System.");
        m.append(Message::user("hi")).await.unwrap();

        let payload = m.format_for_provider(&ToolSet::new()).await.unwrap();
        assert_eq!(payload["model"], "gpt-4o");
        assert_eq!(payload["messages"][0]["content"], "System.");
        assert_eq!(payload["messages"][1]["content"], "hi");

        let response = json!({"choices": [{"message": {"content": "hello"}}]});
        let appended = m.ingest_response(&response).await.unwrap();
        assert_eq!(appended.len(), 1);
        let history = m.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].text(), "hello");
    }

    #[tokio::test]
    async fn test_composer_is_asked_per_request() {
        let mut composer = MockPromptComposer::new();
        composer
            .expect_compose()
            .times(2)
            .returning(|sid| Ok(format!("prompt for {}", sid)));
        let history = Arc::new(StorageHistory::new(Arc::new(MemoryStorage::new())));
        let m = ContextManager::new("s9", &config(1000), history, Arc::new(composer)).unwrap();

        let prepared = m.prepare_for_request().await.unwrap();
        assert_eq!(prepared.system_prompt, "prompt for s9");
        m.format_for_provider(&ToolSet::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_clears_history() {
        let m = manager_with(1000, "");
        m.append(Message::user("hi")).await.unwrap();
        m.reset().await.unwrap();
        assert!(m.history().await.unwrap().is_empty());
    }
}

//! Anthropic Messages API formatter
//!
//! Anthropic keeps the system prompt in a dedicated `system` field, sends
//! tool calls as `tool_use` blocks and answers them with `tool_result`
//! blocks inside a user turn. Images and documents are `image` / `document`
//! blocks with a base64 or url source.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProviderKind;
use crate::error::{HostError, Result};
use crate::mcp::ToolSet;
use crate::session::{BinarySource, ContentPart, Message, MessageContent, Role, ToolCall};

use super::binary::{extract_binary_as_base64_or_url, BinaryPayload};
use super::{ChatOptions, MessageFormatter};

/// `max_tokens` is mandatory for Anthropic.
const DEFAULT_MAX_TOKENS: u32 = 4096;

// ============================================================================
// Claude API Request Types
// ============================================================================

/// Claude API request body.
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    /// Conversation messages (excluding system)
    messages: Vec<ClaudeMessage>,
    /// System prompt (separate from messages in Claude API)
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

/// A message in Claude's format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClaudeMessage {
    /// Role: "user" or "assistant"
    role: String,
    content: ClaudeContent,
}

impl ClaudeMessage {
    fn user_blocks(blocks: Vec<ClaudeContentBlock>) -> Self {
        Self {
            role: "user".to_string(),
            content: ClaudeContent::Blocks(blocks),
        }
    }
}

/// Claude message content - can be simple text or content blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ClaudeContent {
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

/// A content block within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeContentBlock {
    Text {
        text: String,
    },
    Image {
        source: ClaudeSource,
    },
    Document {
        source: ClaudeSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    /// Assistant requesting a tool call
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// Result of a tool call, sent in a user turn
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Anything newer than this formatter (thinking, server tools, ...)
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

impl From<BinaryPayload> for ClaudeSource {
    fn from(payload: BinaryPayload) -> Self {
        match payload {
            BinaryPayload::Base64 { data, mime_type } => ClaudeSource::Base64 {
                media_type: mime_type,
                data,
            },
            BinaryPayload::Url { url, .. } => ClaudeSource::Url { url },
        }
    }
}

/// Claude tool definition.
#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    /// JSON Schema for tool parameters
    input_schema: Value,
}

// ============================================================================
// Claude API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
}

// ============================================================================
// Anthropic Formatter
// ============================================================================

/// Formatter for the Anthropic Messages API.
pub struct AnthropicFormatter {
    model: String,
    options: ChatOptions,
}

impl AnthropicFormatter {
    pub fn new(model: &str, options: ChatOptions) -> Self {
        Self {
            model: model.to_string(),
            options,
        }
    }
}

impl MessageFormatter for AnthropicFormatter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn format(&self, messages: &[Message], system_prompt: &str, tools: &ToolSet) -> Result<Value> {
        let (history_system, claude_messages) = convert_messages(messages)?;

        let system: Vec<String> = std::iter::once(system_prompt.to_string())
            .chain(history_system)
            .filter(|s| !s.is_empty())
            .collect();

        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: claude_messages,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            tools: convert_tools(tools),
            temperature: self.options.temperature,
            top_p: self.options.top_p,
            stop_sequences: self.options.stop.clone(),
        };
        Ok(serde_json::to_value(request)?)
    }

    fn parse_response(&self, response: &Value) -> Result<Vec<Message>> {
        let response: ClaudeResponse = serde_json::from_value(response.clone())
            .map_err(|e| HostError::Format(format!("invalid Anthropic response: {}", e)))?;
        Ok(convert_response(response))
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Split system messages out of the history and convert the rest.
///
/// Consecutive tool results are grouped into one user turn.
fn convert_messages(messages: &[Message]) -> Result<(Vec<String>, Vec<ClaudeMessage>)> {
    let mut system = Vec::new();
    let mut claude_messages: Vec<ClaudeMessage> = Vec::new();
    let mut pending_tool_results: Vec<ClaudeContentBlock> = Vec::new();

    for msg in messages {
        if msg.role != Role::Tool && !pending_tool_results.is_empty() {
            claude_messages.push(ClaudeMessage::user_blocks(std::mem::take(
                &mut pending_tool_results,
            )));
        }

        match msg.role {
            Role::System => system.push(msg.text()),
            Role::User => claude_messages.push(ClaudeMessage {
                role: "user".to_string(),
                content: convert_user_content(&msg.content)?,
            }),
            // Anthropic rejects empty text content.
            Role::Assistant if !msg.has_tool_calls() && msg.text().is_empty() => {}
            Role::Assistant => {
                let text = msg.text();
                let content = if msg.has_tool_calls() {
                    let mut blocks = Vec::with_capacity(msg.tool_calls.len() + 1);
                    if !text.is_empty() {
                        blocks.push(ClaudeContentBlock::Text { text });
                    }
                    blocks.extend(msg.tool_calls.iter().map(|tc| ClaudeContentBlock::ToolUse {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        input: tc.parse_arguments(),
                    }));
                    ClaudeContent::Blocks(blocks)
                } else {
                    ClaudeContent::Text(text)
                };
                claude_messages.push(ClaudeMessage {
                    role: "assistant".to_string(),
                    content,
                });
            }
            Role::Tool => {
                if let Some(tool_call_id) = &msg.tool_call_id {
                    pending_tool_results.push(ClaudeContentBlock::ToolResult {
                        tool_use_id: tool_call_id.clone(),
                        content: msg.text(),
                        is_error: msg.is_error.then_some(true),
                    });
                }
            }
        }
    }

    if !pending_tool_results.is_empty() {
        claude_messages.push(ClaudeMessage::user_blocks(pending_tool_results));
    }

    Ok((system, claude_messages))
}

fn convert_user_content(content: &MessageContent) -> Result<ClaudeContent> {
    let parts = match content {
        MessageContent::Text(text) => return Ok(ClaudeContent::Text(text.clone())),
        MessageContent::Parts(parts) => parts,
    };

    let mut blocks = Vec::with_capacity(parts.len());
    for part in parts {
        blocks.push(match part {
            ContentPart::Text { text } => ClaudeContentBlock::Text { text: text.clone() },
            ContentPart::Image { source, mime_type } => ClaudeContentBlock::Image {
                source: binary_source(source, mime_type)?,
            },
            ContentPart::File {
                source,
                mime_type,
                filename,
            } => ClaudeContentBlock::Document {
                source: binary_source(source, mime_type)?,
                title: filename.clone(),
            },
        });
    }
    Ok(ClaudeContent::Blocks(blocks))
}

fn binary_source(source: &BinarySource, mime_type: &str) -> Result<ClaudeSource> {
    extract_binary_as_base64_or_url(source, mime_type).map(ClaudeSource::from)
}

fn convert_tools(tools: &ToolSet) -> Option<Vec<ClaudeTool>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .values()
            .map(|t| ClaudeTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect(),
    )
}

fn convert_response(response: ClaudeResponse) -> Vec<Message> {
    let mut content = String::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            ClaudeContentBlock::Text { text } => {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(&text);
            }
            ClaudeContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall::new(&id, &name, &input.to_string()));
            }
            _ => {}
        }
    }

    vec![Message::assistant_with_tools(&content, tool_calls)]
}

// ============================================================================
// Tests
// ============================================================================

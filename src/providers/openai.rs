//! OpenAI Chat Completions formatter
//!
//! The system prompt travels as the leading `system` message, tool results
//! are `tool` messages linked by `tool_call_id`, and binary parts become
//! `image_url` / `file` content parts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProviderKind;
use crate::error::{HostError, Result};
use crate::mcp::ToolSet;
use crate::session::{ContentPart, Message, MessageContent, Role, ToolCall};

use super::binary::{extract_binary_as_base64_or_url, BinaryPayload};
use super::{ChatOptions, MessageFormatter};

// ============================================================================
// OpenAI API Request Types
// ============================================================================

/// OpenAI API request body.
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    /// Model identifier
    model: String,
    /// Conversation messages (including system)
    messages: Vec<OpenAIMessage>,
    /// Available tools
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

/// A message in OpenAI's format.
#[derive(Debug, Serialize)]
struct OpenAIMessage {
    /// Role: "system", "user", "assistant", or "tool"
    role: String,
    /// Message content (null for assistant with tool_calls)
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<OpenAIContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCallRequest>>,
    /// ID of the tool call this message is responding to
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAIMessage {
    fn text(role: &str, text: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(OpenAIContent::Text(text)),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// Plain string or an array of typed parts.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAIContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAIImageUrl },
    File { file: OpenAIFile },
}

#[derive(Debug, Serialize)]
struct OpenAIImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct OpenAIFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    /// `data:` URL carrying the file bytes
    file_data: String,
}

/// A tool call in a request (assistant requesting tool execution).
#[derive(Debug, Serialize)]
struct OpenAIToolCallRequest {
    id: String,
    /// Always "function"
    r#type: String,
    function: OpenAIFunctionCall,
}

/// Function call details.
#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    arguments: String,
}

/// OpenAI tool definition.
#[derive(Debug, Serialize)]
struct OpenAITool {
    /// Always "function"
    r#type: String,
    function: OpenAIFunctionDef,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionDef {
    name: String,
    description: String,
    /// JSON Schema for function parameters
    parameters: Value,
}

// ============================================================================
// OpenAI API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    /// Text content (may be null if tool_calls present)
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCallResponse>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCallResponse {
    id: String,
    function: OpenAIFunctionCall,
}

// ============================================================================
// OpenAI Formatter
// ============================================================================

/// Formatter for the OpenAI Chat Completions API.
pub struct OpenAiFormatter {
    model: String,
    options: ChatOptions,
}

impl OpenAiFormatter {
    /// Create a formatter for `model`.
    ///
    /// # Example
    /// ```
    /// use mcphost::providers::{ChatOptions, MessageFormatter, OpenAiFormatter};
    ///
    /// let formatter = OpenAiFormatter::new("gpt-4o", ChatOptions::new());
    /// assert_eq!(formatter.model(), "gpt-4o");
    /// ```
    pub fn new(model: &str, options: ChatOptions) -> Self {
        Self {
            model: model.to_string(),
            options,
        }
    }
}

impl MessageFormatter for OpenAiFormatter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Openai
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn format(&self, messages: &[Message], system_prompt: &str, tools: &ToolSet) -> Result<Value> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if !system_prompt.is_empty() {
            wire.push(OpenAIMessage::text("system", system_prompt.to_string()));
        }
        wire.extend(convert_messages(messages)?);

        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: wire,
            tools: convert_tools(tools),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            top_p: self.options.top_p,
            stop: self.options.stop.clone(),
        };
        Ok(serde_json::to_value(request)?)
    }

    fn parse_response(&self, response: &Value) -> Result<Vec<Message>> {
        let response: OpenAIResponse = serde_json::from_value(response.clone())
            .map_err(|e| HostError::Format(format!("invalid OpenAI response: {}", e)))?;
        Ok(convert_response(response))
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

fn convert_messages(messages: &[Message]) -> Result<Vec<OpenAIMessage>> {
    messages
        .iter()
        .map(|msg| {
            Ok(match msg.role {
                Role::System => OpenAIMessage::text("system", msg.text()),
                Role::User => OpenAIMessage {
                    role: "user".to_string(),
                    content: Some(convert_user_content(&msg.content)?),
                    tool_calls: None,
                    tool_call_id: None,
                },
                Role::Assistant => {
                    let text = msg.text();
                    let tool_calls = msg.has_tool_calls().then(|| {
                        msg.tool_calls
                            .iter()
                            .map(|tc| OpenAIToolCallRequest {
                                id: tc.id.clone(),
                                r#type: "function".to_string(),
                                function: OpenAIFunctionCall {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect()
                    });
                    OpenAIMessage {
                        role: "assistant".to_string(),
                        content: if text.is_empty() && tool_calls.is_some() {
                            None
                        } else {
                            Some(OpenAIContent::Text(text))
                        },
                        tool_calls,
                        tool_call_id: None,
                    }
                }
                Role::Tool => OpenAIMessage {
                    role: "tool".to_string(),
                    content: Some(OpenAIContent::Text(msg.text())),
                    tool_calls: None,
                    tool_call_id: msg.tool_call_id.clone(),
                },
            })
        })
        .collect()
}

fn convert_user_content(content: &MessageContent) -> Result<OpenAIContent> {
    let parts = match content {
        MessageContent::Text(text) => return Ok(OpenAIContent::Text(text.clone())),
        MessageContent::Parts(parts) => parts,
    };

    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        out.push(match part {
            ContentPart::Text { text } => OpenAIContentPart::Text { text: text.clone() },
            ContentPart::Image { source, mime_type } => {
                let payload = extract_binary_as_base64_or_url(source, mime_type)?;
                OpenAIContentPart::ImageUrl {
                    image_url: OpenAIImageUrl {
                        url: payload.to_url(),
                    },
                }
            }
            ContentPart::File {
                source,
                mime_type,
                filename,
            } => match extract_binary_as_base64_or_url(source, mime_type)? {
                inline @ BinaryPayload::Base64 { .. } => OpenAIContentPart::File {
                    file: OpenAIFile {
                        filename: filename.clone(),
                        file_data: inline.to_url(),
                    },
                },
                // Chat Completions has no remote-file part.
                BinaryPayload::Url { url, .. } => OpenAIContentPart::Text {
                    text: format!("[file: {}]", url),
                },
            },
        });
    }
    Ok(OpenAIContent::Parts(out))
}

fn convert_tools(tools: &ToolSet) -> Option<Vec<OpenAITool>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .values()
            .map(|t| OpenAITool {
                r#type: "function".to_string(),
                function: OpenAIFunctionDef {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect(),
    )
}

fn convert_response(response: OpenAIResponse) -> Vec<Message> {
    let Some(choice) = response.choices.into_iter().next() else {
        return Vec::new();
    };

    let content = choice.message.content.unwrap_or_default();
    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall::new(&tc.id, &tc.function.name, &tc.function.arguments))
        .collect();

    vec![Message::assistant_with_tools(&content, tool_calls)]
}

// ============================================================================
// Tests
// ============================================================================

//! Conversation types for mcphost
//!
//! This module defines the provider-neutral message model shared by the
//! context manager, the formatters and the history provider: messages,
//! roles, multimodal content parts and tool calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single message in a conversation.
///
/// Messages can be from users, assistants, system prompts, or tool results.
/// Never mutated after being appended to a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// Plain text or an ordered list of parts
    pub content: MessageContent,
    /// Tool calls made by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// ID of the tool call this message is responding to (for tool results)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool that produced this result (for tool results)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// The tool call failed or was denied (for tool results)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    /// When the message was created
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_content(role: Role, content: MessageContent) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            is_error: false,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    ///
    /// # Example
    /// ```
    /// use mcphost::session::{Message, Role};
    ///
    /// let msg = Message::user("Hello, assistant!");
    /// assert_eq!(msg.role, Role::User);
    /// assert_eq!(msg.text(), "Hello, assistant!");
    /// ```
    pub fn user(content: &str) -> Self {
        Self::with_content(Role::User, MessageContent::Text(content.to_string()))
    }

    /// Create a user message carrying several parts (text, images, files).
    ///
    /// # Example
    /// ```
    /// use mcphost::session::{BinarySource, ContentPart, Message};
    ///
    /// let msg = Message::user_with_parts(vec![
    ///     ContentPart::text("What is in this picture?"),
    ///     ContentPart::image(BinarySource::Url("https://example.com/cat.png".into()), "image/png"),
    /// ]);
    /// assert_eq!(msg.parts().len(), 2);
    /// ```
    pub fn user_with_parts(parts: Vec<ContentPart>) -> Self {
        Self::with_content(Role::User, MessageContent::Parts(parts))
    }

    /// Create a new assistant message.
    pub fn assistant(content: &str) -> Self {
        Self::with_content(Role::Assistant, MessageContent::Text(content.to_string()))
    }

    /// Create an assistant message that requests tool calls.
    ///
    /// # Example
    /// ```
    /// use mcphost::session::{Message, ToolCall};
    ///
    /// let call = ToolCall::new("call_1", "search", r#"{"q":"rust"}"#);
    /// let msg = Message::assistant_with_tools("", vec![call]);
    /// assert!(msg.has_tool_calls());
    /// ```
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::assistant(content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a new system message.
    pub fn system(content: &str) -> Self {
        Self::with_content(Role::System, MessageContent::Text(content.to_string()))
    }

    /// Create a tool result message answering `tool_call_id`.
    ///
    /// # Example
    /// ```
    /// use mcphost::session::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_1", "search", "3 results");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    /// assert_eq!(msg.tool_name.as_deref(), Some("search"));
    /// ```
    pub fn tool_result(tool_call_id: &str, tool_name: &str, content: &str) -> Self {
        let mut msg = Self::with_content(Role::Tool, MessageContent::Text(content.to_string()));
        msg.tool_call_id = Some(tool_call_id.to_string());
        msg.tool_name = Some(tool_name.to_string());
        msg
    }

    /// Create a tool result reporting a failed or denied call.
    pub fn tool_error(tool_call_id: &str, tool_name: &str, content: &str) -> Self {
        let mut msg = Self::tool_result(tool_call_id, tool_name, content);
        msg.is_error = true;
        msg
    }

    /// Concatenated text of the message. Non-text parts are skipped.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Content viewed as parts. Plain text yields a single text part.
    pub fn parts(&self) -> Vec<ContentPart> {
        match &self.content {
            MessageContent::Text(t) if t.is_empty() => Vec::new(),
            MessageContent::Text(t) => vec![ContentPart::text(t)],
            MessageContent::Parts(parts) => parts.clone(),
        }
    }

    /// Check if this message requests tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Check if this is a system message.
    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

/// One element of a multimodal message.
///
/// Closed set: every formatter matches exhaustively on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        source: BinarySource,
        mime_type: String,
    },
    File {
        source: BinarySource,
        mime_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
}

impl ContentPart {
    /// Text part.
    pub fn text(text: &str) -> Self {
        ContentPart::Text {
            text: text.to_string(),
        }
    }

    /// Image part.
    pub fn image(source: BinarySource, mime_type: &str) -> Self {
        ContentPart::Image {
            source,
            mime_type: mime_type.to_string(),
        }
    }

    /// File part.
    pub fn file(source: BinarySource, mime_type: &str, filename: Option<&str>) -> Self {
        ContentPart::File {
            source,
            mime_type: mime_type.to_string(),
            filename: filename.map(str::to_string),
        }
    }

    /// MIME type of a binary part; `None` for text.
    pub fn mime_type(&self) -> Option<&str> {
        match self {
            ContentPart::Text { .. } => None,
            ContentPart::Image { mime_type, .. } | ContentPart::File { mime_type, .. } => {
                Some(mime_type)
            }
        }
    }
}

/// Where the bytes of an image or file part come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum BinarySource {
    /// Base64 text, no `data:` prefix.
    Base64(String),
    /// Remote URL or `data:` URL.
    Url(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message from the user
    User,
    /// Message from the AI assistant
    Assistant,
    /// System prompt or instruction
    System,
    /// Result from a tool execution
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool call requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// Arguments as a JSON string
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Parse the arguments, falling back to an empty object on bad JSON.
    pub fn parse_arguments(&self) -> serde_json::Value {
        if self.arguments.trim().is_empty() {
            return serde_json::json!({});
        }
        serde_json::from_str(&self.arguments).unwrap_or_else(|_| serde_json::json!({}))
    }
}

//! Agent lifecycle events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One lifecycle notification from the turn loop.
///
/// Serialized with a `type` tag and camelCase names for UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AgentEvent {
    /// A model request is about to be sent.
    Thinking { session_id: String },
    /// A fragment of streamed assistant text.
    Chunk { session_id: String, text: String },
    /// The model asked for a tool call.
    ToolCall {
        session_id: String,
        call_id: String,
        tool_name: String,
        arguments: Value,
    },
    /// A tool call finished (or was denied).
    ToolResult {
        session_id: String,
        call_id: String,
        tool_name: String,
        result: String,
        is_error: bool,
    },
    /// Final assistant text for the turn.
    Response { session_id: String, text: String },
    /// The turn failed.
    Error { session_id: String, message: String },
    /// History was cleared.
    ConversationReset { session_id: String },
}

impl AgentEvent {
    pub fn session_id(&self) -> &str {
        match self {
            AgentEvent::Thinking { session_id }
            | AgentEvent::Chunk { session_id, .. }
            | AgentEvent::ToolCall { session_id, .. }
            | AgentEvent::ToolResult { session_id, .. }
            | AgentEvent::Response { session_id, .. }
            | AgentEvent::Error { session_id, .. }
            | AgentEvent::ConversationReset { session_id } => session_id,
        }
    }

    /// Short name, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::Thinking { .. } => "thinking",
            AgentEvent::Chunk { .. } => "chunk",
            AgentEvent::ToolCall { .. } => "toolCall",
            AgentEvent::ToolResult { .. } => "toolResult",
            AgentEvent::Response { .. } => "response",
            AgentEvent::Error { .. } => "error",
            AgentEvent::ConversationReset { .. } => "conversationReset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_shape() {
        let event = AgentEvent::ToolResult {
            session_id: "s1".into(),
            call_id: "c1".into(),
            tool_name: "search".into(),
            result: "3 hits".into(),
            is_error: false,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "toolResult",
                "sessionId": "s1",
                "callId": "c1",
                "toolName": "search",
                "result": "3 hits",
                "isError": false
            })
        );
        assert_eq!(value["type"], event.kind());
    }

    #[test]
    fn test_session_id_accessor() {
        let event = AgentEvent::ConversationReset {
            session_id: "abc".into(),
        };
        assert_eq!(event.session_id(), "abc");
        assert_eq!(event.kind(), "conversationReset");
    }
}

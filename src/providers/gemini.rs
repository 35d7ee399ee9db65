//! Gemini `generateContent` formatter
//!
//! Gemini carries the system prompt in `systemInstruction`, calls the
//! assistant role `model`, and links function calls to their responses by
//! tool name rather than by id. Responses carry no call ids, so parsing
//! generates them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::ProviderKind;
use crate::error::{HostError, Result};
use crate::mcp::ToolSet;
use crate::session::{ContentPart, Message, MessageContent, Role, ToolCall};

use super::binary::{extract_binary_as_base64_or_url, BinaryPayload};
use super::{ChatOptions, MessageFormatter};

// ============================================================================
// Gemini API Request Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

/// One part of a content entry. Exactly one field is set.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_data: Option<GeminiFileData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
}

impl GeminiPart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

// ============================================================================
// Gemini API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

// ============================================================================
// Gemini Formatter
// ============================================================================

/// Formatter for the Gemini `generateContent` API.
///
/// The model is part of the request URL on this API, so it is not written
/// into the payload.
pub struct GeminiFormatter {
    model: String,
    options: ChatOptions,
}

impl GeminiFormatter {
    pub fn new(model: &str, options: ChatOptions) -> Self {
        Self {
            model: model.to_string(),
            options,
        }
    }

    fn generation_config(&self) -> Option<GeminiGenerationConfig> {
        let o = &self.options;
        if *o == ChatOptions::default() {
            return None;
        }
        Some(GeminiGenerationConfig {
            temperature: o.temperature,
            max_output_tokens: o.max_tokens,
            top_p: o.top_p,
            stop_sequences: o.stop.clone(),
        })
    }
}

impl MessageFormatter for GeminiFormatter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn format(&self, messages: &[Message], system_prompt: &str, tools: &ToolSet) -> Result<Value> {
        let (history_system, contents) = convert_messages(messages)?;

        let system_parts: Vec<GeminiPart> = std::iter::once(system_prompt.to_string())
            .chain(history_system)
            .filter(|s| !s.is_empty())
            .map(GeminiPart::text)
            .collect();

        let request = GeminiRequest {
            contents,
            system_instruction: (!system_parts.is_empty())
                .then_some(GeminiSystemInstruction { parts: system_parts }),
            tools: convert_tools(tools),
            generation_config: self.generation_config(),
        };
        Ok(serde_json::to_value(request)?)
    }

    fn parse_response(&self, response: &Value) -> Result<Vec<Message>> {
        let response: GeminiResponse = serde_json::from_value(response.clone())
            .map_err(|e| HostError::Format(format!("invalid Gemini response: {}", e)))?;
        convert_response(response)
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

fn convert_messages(messages: &[Message]) -> Result<(Vec<String>, Vec<GeminiContent>)> {
    let mut system = Vec::new();
    let mut contents: Vec<GeminiContent> = Vec::new();
    let mut pending_responses: Vec<GeminiPart> = Vec::new();
    // Tool results may lack a name; recover it from the call they answer.
    let mut call_names: HashMap<&str, &str> = HashMap::new();

    for msg in messages {
        if msg.role != Role::Tool && !pending_responses.is_empty() {
            contents.push(GeminiContent {
                role: "user".to_string(),
                parts: std::mem::take(&mut pending_responses),
            });
        }

        match msg.role {
            Role::System => system.push(msg.text()),
            Role::User => contents.push(GeminiContent {
                role: "user".to_string(),
                parts: convert_user_parts(&msg.content)?,
            }),
            Role::Assistant => {
                let mut parts = Vec::with_capacity(msg.tool_calls.len() + 1);
                let text = msg.text();
                if !text.is_empty() {
                    parts.push(GeminiPart::text(text));
                }
                for tc in &msg.tool_calls {
                    call_names.insert(tc.id.as_str(), tc.name.as_str());
                    parts.push(GeminiPart {
                        function_call: Some(GeminiFunctionCall {
                            name: tc.name.clone(),
                            args: tc.parse_arguments(),
                        }),
                        ..Default::default()
                    });
                }
                if parts.is_empty() {
                    parts.push(GeminiPart::text(String::new()));
                }
                contents.push(GeminiContent {
                    role: "model".to_string(),
                    parts,
                });
            }
            Role::Tool => {
                let name = msg
                    .tool_name
                    .as_deref()
                    .or_else(|| {
                        msg.tool_call_id
                            .as_deref()
                            .and_then(|id| call_names.get(id).copied())
                    })
                    .ok_or_else(|| {
                        HostError::Format("tool result has no tool name for Gemini".into())
                    })?;
                pending_responses.push(GeminiPart {
                    function_response: Some(GeminiFunctionResponse {
                        name: name.to_string(),
                        response: json!({ "content": msg.text() }),
                    }),
                    ..Default::default()
                });
            }
        }
    }

    if !pending_responses.is_empty() {
        contents.push(GeminiContent {
            role: "user".to_string(),
            parts: pending_responses,
        });
    }

    Ok((system, contents))
}

fn convert_user_parts(content: &MessageContent) -> Result<Vec<GeminiPart>> {
    let parts = match content {
        MessageContent::Text(text) => return Ok(vec![GeminiPart::text(text.clone())]),
        MessageContent::Parts(parts) => parts,
    };

    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        out.push(match part {
            ContentPart::Text { text } => GeminiPart::text(text.clone()),
            ContentPart::Image { source, mime_type }
            | ContentPart::File {
                source, mime_type, ..
            } => match extract_binary_as_base64_or_url(source, mime_type)? {
                BinaryPayload::Base64 { data, mime_type } => GeminiPart {
                    inline_data: Some(GeminiInlineData { mime_type, data }),
                    ..Default::default()
                },
                BinaryPayload::Url { url, mime_type } => GeminiPart {
                    file_data: Some(GeminiFileData {
                        mime_type,
                        file_uri: url,
                    }),
                    ..Default::default()
                },
            },
        });
    }
    Ok(out)
}

fn convert_tools(tools: &ToolSet) -> Option<Vec<GeminiTool>> {
    if tools.is_empty() {
        return None;
    }
    Some(vec![GeminiTool {
        function_declarations: tools
            .values()
            .map(|t| GeminiFunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect(),
    }])
}

fn convert_response(response: GeminiResponse) -> Result<Vec<Message>> {
    let candidates = match response.candidates {
        Some(c) => c,
        None => {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(HostError::Format(format!("Gemini returned no candidates: {}", reason)));
        }
    };

    let Some(content) = candidates.into_iter().next().and_then(|c| c.content) else {
        return Ok(Vec::new());
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in content.parts {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(call) = part.function_call {
            let id = format!("call_{}", Uuid::new_v4().simple());
            let args = if call.args.is_null() {
                "{}".to_string()
            } else {
                call.args.to_string()
            };
            tool_calls.push(ToolCall::new(&id, &call.name, &args));
        }
    }

    Ok(vec![Message::assistant_with_tools(&text, tool_calls)])
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::ToolDefinition;
    use crate::session::BinarySource;

    fn formatter() -> GeminiFormatter {
        GeminiFormatter::new("gemini-1.5-flash", ChatOptions::new())
    }

    #[test]
    fn test_system_instruction_and_roles() {
        let messages = vec![Message::user("Hi"), Message::assistant("Hello!")];
        let payload = formatter().format(&messages, "Be kind.", &ToolSet::new()).unwrap();

        assert_eq!(payload["systemInstruction"]["parts"][0]["text"], "Be kind.");
        assert_eq!(payload["contents"][0]["role"], "user");
        assert_eq!(payload["contents"][1]["role"], "model");
        assert_eq!(payload["contents"][1]["parts"][0]["text"], "Hello!");
        assert!(payload.get("generationConfig").is_none());
        assert!(payload.get("model").is_none());
    }

    #[test]
    fn test_generation_config() {
        let f = GeminiFormatter::new(
            "gemini-1.5-pro",
            ChatOptions::new().with_max_tokens(100).with_temperature(0.3),
        );
        let payload = f.format(&[Message::user("x")], "", &ToolSet::new()).unwrap();
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], 100);
        assert!(payload["generationConfig"].get("topP").is_none());
    }

    #[test]
    fn test_function_call_and_response_keyed_by_name() {
        let messages = vec![
            Message::user("weather?"),
            Message::assistant_with_tools(
                "",
                vec![ToolCall::new("c1", "get_weather", r#"{"city":"Oslo"}"#)],
            ),
            Message::tool_result("c1", "get_weather", "rain"),
        ];
        let payload = formatter().format(&messages, "", &ToolSet::new()).unwrap();

        let call = &payload["contents"][1]["parts"][0]["functionCall"];
        assert_eq!(call["name"], "get_weather");
        assert_eq!(call["args"]["city"], "Oslo");

        let response = &payload["contents"][2];
        assert_eq!(response["role"], "user");
        assert_eq!(response["parts"][0]["functionResponse"]["name"], "get_weather");
        assert_eq!(
            response["parts"][0]["functionResponse"]["response"]["content"],
            "rain"
        );
    }

    #[test]
    fn test_tool_name_recovered_from_call_id() {
        let mut result = Message::tool_result("c1", "ignored", "ok");
        result.tool_name = None;
        let messages = vec![
            Message::assistant_with_tools("", vec![ToolCall::new("c1", "lookup", "{}")]),
            result,
        ];
        let payload = formatter().format(&messages, "", &ToolSet::new()).unwrap();
        assert_eq!(
            payload["contents"][1]["parts"][0]["functionResponse"]["name"],
            "lookup"
        );

        let mut orphan = Message::tool_result("zz", "x", "ok");
        orphan.tool_name = None;
        assert!(formatter().format(&[orphan], "", &ToolSet::new()).is_err());
    }

    #[test]
    fn test_inline_and_file_data() {
        let messages = vec![Message::user_with_parts(vec![
            ContentPart::image(BinarySource::Bytes(vec![0, 1, 2]), "image/png"),
            ContentPart::file(
                BinarySource::Url("gs://bucket/a.pdf".into()),
                "application/pdf",
                None,
            ),
        ])];
        let payload = formatter().format(&messages, "", &ToolSet::new()).unwrap();
        let parts = &payload["contents"][0]["parts"];

        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "AAEC");
        assert_eq!(parts[1]["fileData"]["fileUri"], "gs://bucket/a.pdf");
    }

    #[test]
    fn test_tools_as_function_declarations() {
        let mut tools = ToolSet::new();
        tools.insert(
            "search".into(),
            ToolDefinition::new("search", "Search", json!({"type": "object"})),
        );
        let payload = formatter().format(&[], "", &tools).unwrap();
        assert_eq!(payload["tools"][0]["functionDeclarations"][0]["name"], "search");
    }

    #[test]
    fn test_parse_generates_call_ids() {
        let response = json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"text": "Searching"},
                {"functionCall": {"name": "search", "args": {"q": "rust"}}},
                {"functionCall": {"name": "search", "args": {"q": "tokio"}}}
            ]}}]
        });
        let parsed = formatter().parse_response(&response).unwrap();
        let calls = &parsed[0].tool_calls;

        assert_eq!(parsed[0].text(), "Searching");
        assert_eq!(calls.len(), 2);
        assert!(calls[0].id.starts_with("call_"));
        assert_ne!(calls[0].id, calls[1].id);
        assert_eq!(calls[1].parse_arguments()["q"], "tokio");
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let response = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = formatter().parse_response(&response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        let empty = formatter().parse_response(&json!({"candidates": []})).unwrap();
        assert!(empty.is_empty());
    }
}

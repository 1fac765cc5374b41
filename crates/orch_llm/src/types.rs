//! Provider-agnostic request/response/stream types. Each provider module
//! converts to and from these at its own HTTP boundary.

use std::collections::HashMap;
use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ToolCall { id: String, name: String, arguments: JsonValue },
    ToolResult { tool_call_id: String, content: JsonValue },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: JsonValue) -> Self {
        ContentPart::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: JsonValue) -> Self {
        ContentPart::ToolResult {
            tool_call_id: tool_call_id.into(),
            content,
        }
    }
}

/// A single conversation turn, accepted either as plain text or a list of
/// structured parts (`impl Into<MessageContent>` covers both call sites).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into().0,
        }
    }

    pub fn parts(&self) -> &[ContentPart] {
        &self.content
    }

    /// The concatenated text of every `Text` part, if any exist.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Accepts either `&str`/`String` or `Vec<ContentPart>` at `Message::new` call
/// sites without forcing every caller to wrap a single string in a vec.
pub struct MessageContent(pub Vec<ContentPart>);

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent(vec![ContentPart::text(s)])
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent(vec![ContentPart::text(s)])
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        MessageContent(parts)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub function: ToolFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required { name: String },
}

/// A single additional HTTP header beyond what the provider sets by
/// default, merged on top at request-build time.
#[derive(Debug, Clone, Default)]
pub struct Headers(HashMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn merge_with(&mut self, other: &Headers) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn to_reqwest_headers(&self) -> reqwest::header::HeaderMap {
        let mut map = reqwest::header::HeaderMap::new();
        for (k, v) in &self.0 {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(k.as_bytes()),
                reqwest::header::HeaderValue::from_str(v),
            ) {
                map.insert(name, value);
            }
        }
        map
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnthropicThinkingOptions {
    pub budget_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicOptions {
    pub thinking: Option<AnthropicThinkingOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderOptions {
    Anthropic(AnthropicOptions),
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_choice: Option<ToolChoice>,
    pub headers: Option<Headers>,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub options: GenerateOptions,
    pub provider_options: Option<ProviderOptions>,
    pub telemetry_metadata: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseContent {
    Text { text: String },
    Reasoning { reasoning: String },
    ToolCall(ToolCall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReasonKind {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishReason {
    pub unified: FinishReasonKind,
    pub raw: Option<String>,
}

impl FinishReason {
    pub fn with_raw(unified: FinishReasonKind, raw: impl Into<String>) -> Self {
        Self {
            unified,
            raw: Some(raw.into()),
        }
    }

    pub fn other() -> Self {
        Self {
            unified: FinishReasonKind::Other,
            raw: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputTokenDetails {
    pub total: Option<u32>,
    pub no_cache: Option<u32>,
    pub cache_read: Option<u32>,
    pub cache_write: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub input_token_details: Option<InputTokenDetails>,
    pub output_token_details: Option<InputTokenDetails>,
    pub raw: Option<JsonValue>,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            input_token_details: None,
            output_token_details: None,
            raw: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub content: Vec<ResponseContent>,
    pub usage: Usage,
    pub finish_reason: FinishReason,
    pub metadata: Option<JsonValue>,
    pub warnings: Option<Vec<String>>,
}

impl GenerateResponse {
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.content
            .iter()
            .filter_map(|c| match c {
                ResponseContent::ToolCall(tc) => Some(tc),
                _ => None,
            })
            .collect()
    }

    pub fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .iter()
            .filter_map(|c| match c {
                ResponseContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta { id: String, delta: String },
    ReasoningDelta { id: String, delta: String },
    ToolCallStart { id: String, name: String },
    ToolCallDelta { id: String, delta: String },
    ToolCallEnd { id: String, name: String, arguments: JsonValue },
    Finish { usage: Usage, reason: FinishReason },
}

impl StreamEvent {
    pub fn text_delta(id: impl Into<String>, delta: impl Into<String>) -> Self {
        StreamEvent::TextDelta { id: id.into(), delta: delta.into() }
    }

    pub fn reasoning_delta(id: impl Into<String>, delta: impl Into<String>) -> Self {
        StreamEvent::ReasoningDelta { id: id.into(), delta: delta.into() }
    }

    pub fn tool_call_start(id: impl Into<String>, name: impl Into<String>) -> Self {
        StreamEvent::ToolCallStart { id: id.into(), name: name.into() }
    }

    pub fn tool_call_delta(id: impl Into<String>, delta: impl Into<String>) -> Self {
        StreamEvent::ToolCallDelta { id: id.into(), delta: delta.into() }
    }

    pub fn tool_call_end(id: impl Into<String>, name: impl Into<String>, arguments: JsonValue) -> Self {
        StreamEvent::ToolCallEnd { id: id.into(), name: name.into(), arguments }
    }

    pub fn finish(usage: Usage, reason: FinishReason) -> Self {
        StreamEvent::Finish { usage, reason }
    }
}

pub struct GenerateStream {
    inner: Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>,
}

impl GenerateStream {
    pub fn new(inner: Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>) -> Self {
        Self { inner }
    }
}

impl Stream for GenerateStream {
    type Item = Result<StreamEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_text_concatenates_text_parts() {
        let msg = Message::new(Role::User, "hello");
        assert_eq!(msg.text(), Some("hello".to_string()));
    }

    #[test]
    fn message_from_parts_extracts_tool_call() {
        let msg = Message::new(Role::Assistant, vec![ContentPart::tool_call("c1", "execute", serde_json::json!({}))]);
        assert!(msg.text().is_none());
        assert_eq!(msg.parts().len(), 1);
    }

    #[test]
    fn usage_new_computes_total() {
        let usage = Usage::new(10, 5);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn headers_merge_overrides_existing_keys() {
        let mut base = Headers::new();
        base.insert("X-A", "1");
        let mut custom = Headers::new();
        custom.insert("X-A", "2");
        base.merge_with(&custom);
        let map = base.to_reqwest_headers();
        assert_eq!(map.get("X-A").unwrap(), "2");
    }

    #[test]
    fn generate_response_extracts_tool_calls_and_text() {
        let resp = GenerateResponse {
            content: vec![
                ResponseContent::Text { text: "done".to_string() },
                ResponseContent::ToolCall(ToolCall { id: "c1".to_string(), name: "execute".to_string(), arguments: serde_json::json!({}) }),
            ],
            usage: Usage::new(1, 1),
            finish_reason: FinishReason::other(),
            metadata: None,
            warnings: None,
        };
        assert_eq!(resp.text(), Some("done".to_string()));
        assert_eq!(resp.tool_calls().len(), 1);
    }
}

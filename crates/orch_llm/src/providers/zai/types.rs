//! Z.AI (GLM) chat-completions wire types. OpenAI-compatible shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct ZaiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl ZaiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), base_url: "https://api.z.ai/api/paas/v4/".to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut url = base_url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.base_url = url;
        self
    }
}

impl Default for ZaiConfig {
    fn default() -> Self {
        Self::new(std::env::var("ZAI_API_KEY").unwrap_or_default())
    }
}

#[derive(Debug, Serialize)]
pub struct ZaiRequest {
    pub model: String,
    pub messages: Vec<ZaiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ZaiThinkingConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ZaiThinkingConfig {
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ZaiMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ZaiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZaiToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub function: ZaiFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZaiFunction {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct ZaiResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<ZaiChoice>,
    pub usage: ZaiUsage,
}

#[derive(Debug, Deserialize)]
pub struct ZaiChoice {
    pub index: u32,
    pub message: ZaiResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ZaiResponseMessage {
    pub role: String,
    pub content: Option<String>,
    pub reasoning_content: Option<String>,
    pub tool_calls: Option<Vec<ZaiToolCall>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZaiUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<ZaiPromptTokensDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZaiPromptTokensDetails {
    pub cached_tokens: Option<u32>,
}

/// One parsed SSE chunk from the streaming `/chat/completions` endpoint.
#[derive(Debug, Deserialize)]
pub struct ZaiStreamChunk {
    pub choices: Vec<ZaiStreamChoice>,
    #[serde(default)]
    pub usage: Option<ZaiUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ZaiStreamChoice {
    pub delta: ZaiDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ZaiDelta {
    pub content: Option<String>,
    pub reasoning_content: Option<String>,
    pub tool_calls: Option<Vec<ZaiStreamToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZaiStreamToolCall {
    pub index: u32,
    pub id: Option<String>,
    pub function: ZaiStreamFunction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZaiStreamFunction {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

//! Anthropic provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use reqwest_eventsource::EventSource;

use super::convert::{from_anthropic_response, to_anthropic_request};
use super::stream::create_stream;
use super::types::{AnthropicConfig, AnthropicResponse, API_VERSION};
use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::types::{GenerateRequest, GenerateResponse, GenerateStream, Headers};

pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicProvider {
    pub const API_KEY_ENV: &'static str = "ANTHROPIC_API_KEY";

    pub fn new(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::MissingApiKey("anthropic".to_string()));
        }
        Ok(Self { config, client: Client::new() })
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(Self::API_KEY_ENV).map_err(|_| Error::MissingApiKey("anthropic".to_string()))?;
        Self::new(AnthropicConfig::new(api_key))
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn provider_id(&self) -> &str {
        "anthropic"
    }

    fn build_headers(&self, custom_headers: Option<&Headers>) -> Headers {
        let mut headers = Headers::new();
        headers.insert("x-api-key", self.config.api_key.clone());
        headers.insert("anthropic-version", API_VERSION);
        headers.insert("content-type", "application/json");

        if let Some(custom) = custom_headers {
            headers.merge_with(custom);
        }

        headers
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec![
            "claude-opus-4-6".to_string(),
            "claude-sonnet-4-6".to_string(),
            "claude-haiku-4-6".to_string(),
        ])
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}messages", self.config.base_url);
        let anthropic_request = to_anthropic_request(&request, false)?;
        let headers = self.build_headers(request.options.headers.as_ref());

        let response = self
            .client
            .post(&url)
            .headers(headers.to_reqwest_headers())
            .json(&anthropic_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::provider_error(format!("Anthropic API error {}: {}", status, error_text)));
        }

        let anthropic_resp: AnthropicResponse = response.json().await?;
        from_anthropic_response(anthropic_resp)
    }

    async fn stream(&self, request: GenerateRequest) -> Result<GenerateStream> {
        let url = format!("{}messages", self.config.base_url);
        let anthropic_request = to_anthropic_request(&request, true)?;
        let headers = self.build_headers(request.options.headers.as_ref());

        let req_builder = self
            .client
            .post(&url)
            .headers(headers.to_reqwest_headers())
            .json(&anthropic_request);

        let event_source = EventSource::new(req_builder)
            .map_err(|e| Error::stream_error(format!("failed to create event source: {}", e)))?;

        create_stream(event_source).await
    }
}

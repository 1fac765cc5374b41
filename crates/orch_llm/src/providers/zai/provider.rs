//! Z.AI provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use reqwest_eventsource::EventSource;

use super::convert::{from_zai_response, to_zai_request};
use super::stream::create_stream;
use super::types::{ZaiConfig, ZaiResponse};
use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::types::{GenerateRequest, GenerateResponse, GenerateStream, Headers};

const MAX_RETRIES: u32 = 3;
const BASE_RETRY_DELAY_MS: u64 = 1000;

pub struct ZaiProvider {
    config: ZaiConfig,
    client: Client,
}

impl ZaiProvider {
    pub const API_KEY_ENV: &'static str = "ZAI_API_KEY";

    pub fn new(config: ZaiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::MissingApiKey("zai".to_string()));
        }
        Ok(Self { config, client: Client::new() })
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(Self::API_KEY_ENV).map_err(|_| Error::MissingApiKey("zai".to_string()))?;
        Self::new(ZaiConfig::new(api_key))
    }

    /// Z.AI returns 429 both for a transient rate limit and for an exhausted
    /// account balance; only the former is worth retrying.
    fn is_balance_error(body: &str) -> bool {
        body.contains("balance") || body.contains("recharge") || body.contains("1113")
    }

    fn retry_delay(attempt: u32) -> std::time::Duration {
        std::time::Duration::from_millis(BASE_RETRY_DELAY_MS * 2u64.pow(attempt))
    }
}

#[async_trait]
impl Provider for ZaiProvider {
    fn provider_id(&self) -> &str {
        "zai"
    }

    fn build_headers(&self, custom_headers: Option<&Headers>) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Authorization", format!("Bearer {}", self.config.api_key));
        headers.insert("Content-Type", "application/json");

        if let Some(custom) = custom_headers {
            headers.merge_with(custom);
        }

        headers
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec![
            "glm-5".to_string(),
            "glm-4-plus".to_string(),
            "glm-4-air".to_string(),
            "glm-4-airx".to_string(),
            "glm-4-long".to_string(),
            "glm-4v-plus".to_string(),
            "glm-4v-flash".to_string(),
        ])
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}chat/completions", self.config.base_url);
        let zai_request = to_zai_request(&request, false)?;
        let headers = self.build_headers(request.options.headers.as_ref());

        for attempt in 0..=MAX_RETRIES {
            let response = self.client.post(&url).headers(headers.to_reqwest_headers()).json(&zai_request).send().await?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let body = response.text().await.unwrap_or_default();
                if Self::is_balance_error(&body) {
                    return Err(Error::InsufficientBalance(body));
                }
                if attempt < MAX_RETRIES {
                    tokio::time::sleep(Self::retry_delay(attempt)).await;
                    continue;
                }
                return Err(Error::RateLimitExceeded(format!("Z.AI rate limit exceeded: {}", body)));
            }

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::provider_error(format!("Z.AI API error {}: {}", status, body)));
            }

            let zai_resp: ZaiResponse = response.json().await?;
            return from_zai_response(zai_resp);
        }

        Err(Error::RateLimitExceeded("Z.AI rate limit exceeded after retries".to_string()))
    }

    async fn stream(&self, request: GenerateRequest) -> Result<GenerateStream> {
        let url = format!("{}chat/completions", self.config.base_url);
        let zai_request = to_zai_request(&request, true)?;
        let headers = self.build_headers(request.options.headers.as_ref());

        for attempt in 0..=MAX_RETRIES {
            let req_builder = self.client.post(&url).headers(headers.to_reqwest_headers()).json(&zai_request);
            let event_source =
                EventSource::new(req_builder).map_err(|e| Error::stream_error(format!("failed to create event source: {}", e)))?;

            match create_stream(event_source).await {
                Ok(stream) => return Ok(stream),
                Err(Error::ProviderError(ref msg)) if msg.contains("429") => {
                    if Self::is_balance_error(msg) {
                        return Err(Error::InsufficientBalance(msg.clone()));
                    }
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(Self::retry_delay(attempt)).await;
                        continue;
                    }
                    return Err(Error::RateLimitExceeded(format!("Z.AI rate limit exceeded: {}", msg)));
                }
                other => return other,
            }
        }

        Err(Error::RateLimitExceeded("Z.AI rate limit exceeded after retries".to_string()))
    }
}

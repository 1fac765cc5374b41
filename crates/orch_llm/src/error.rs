//! Unified error type shared by every provider implementation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("missing API key for provider: {0}")]
    MissingApiKey(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn provider_error(message: impl Into<String>) -> Self {
        Error::ProviderError(message.into())
    }

    pub fn stream_error(message: impl Into<String>) -> Self {
        Error::StreamError(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Error::InvalidResponse(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_not_found_message() {
        let err = Error::ProviderNotFound("foo".to_string());
        assert_eq!(err.to_string(), "provider not found: foo");
    }

    #[test]
    fn provider_error_helper() {
        let err = Error::provider_error("429 from upstream");
        assert!(err.to_string().contains("429 from upstream"));
    }
}

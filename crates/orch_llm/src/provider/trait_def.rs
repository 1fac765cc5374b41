use async_trait::async_trait;

use crate::error::Result;
use crate::types::{GenerateRequest, GenerateResponse, GenerateStream, Headers};

/// One chat-completions backend. Implementations own their own HTTP client
/// and wire format; everything above this trait speaks only the unified
/// types in [`crate::types`].
#[async_trait]
pub trait Provider: Send + Sync {
    fn provider_id(&self) -> &str;

    /// Builds the headers for one request, merging any per-call overrides
    /// on top of the provider's defaults (auth, content-type).
    fn build_headers(&self, custom_headers: Option<&Headers>) -> Headers;

    /// Known model identifiers for this provider. Providers without a
    /// models endpoint return a hardcoded list; the default is empty.
    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    async fn stream(&self, request: GenerateRequest) -> Result<GenerateStream>;
}

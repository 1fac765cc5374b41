//! Z.AI provider: the GLM model family via an OpenAI-compatible
//! `/chat/completions` endpoint. API docs: https://docs.z.ai/api-reference/llm/chat-completion

mod convert;
mod provider;
mod stream;
mod types;

pub use provider::ZaiProvider;
pub use types::{ZaiConfig, ZaiRequest, ZaiResponse};

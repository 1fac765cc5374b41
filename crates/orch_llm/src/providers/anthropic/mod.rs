//! Anthropic provider module.
//!
//! Implements the Provider trait against Claude's Messages API.
//! API docs: https://docs.anthropic.com/en/api/messages

mod convert;
mod provider;
mod stream;
mod types;

pub use provider::AnthropicProvider;
pub use types::AnthropicConfig;

//! Provider-agnostic chat-completions client used by the controller to talk
//! to whichever LLM backs a session, with streaming support.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use orch_llm::{Provider, ProviderRegistry, AnthropicProvider};
//!
//! let provider = AnthropicProvider::from_env().unwrap();
//! let registry = ProviderRegistry::new()
//!     .register("anthropic", provider);
//! ```

pub mod error;
pub mod provider;
pub mod providers;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export core abstractions
pub use error::{Error, Result};
pub use provider::{Provider, ProviderRegistry};

// Re-export provider implementations
pub use providers::AnthropicProvider;
pub use providers::ZaiProvider;

// Re-export commonly used types
pub use types::{
    GenerateRequest, GenerateResponse, GenerateStream, Message, Role, StreamEvent,
};

pub mod anthropic;
pub mod zai;

pub use anthropic::AnthropicProvider;
pub use zai::ZaiProvider;

//! Agent runtime configuration.

use std::str::FromStr;
use std::time::Duration;

/// LLM provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    #[default]
    Anthropic,
    ZAI,
    OpenAI,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::ZAI => "zai",
            LlmProvider::OpenAI => "openai",
            LlmProvider::Ollama => "ollama",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" => Ok(LlmProvider::Anthropic),
            "zai" | "z.ai" => Ok(LlmProvider::ZAI),
            "openai" => Ok(LlmProvider::OpenAI),
            "ollama" => Ok(LlmProvider::Ollama),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable configuration for one controller run, loaded once per session
/// and shared by the agent runtime, QA engine, and HITL middleware.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub model: String,
    pub provider: LlmProvider,
    pub max_tokens: u32,
    pub context_limit: u64,
    /// Self-heal rounds allowed before `qa_validate` routes to `fail`.
    pub max_rounds: u32,
    pub qa_enabled: bool,
    pub qa_timeout: Duration,
    pub qa_output_max_chars: usize,
    pub run_tests: bool,
    pub git_sync_enabled: bool,
    pub git_sync_required: bool,
    /// Oldest turns are summarized once the history exceeds this many messages.
    pub compaction_trigger_messages: usize,
    /// Most recent turns kept verbatim after compaction.
    pub keep_messages: usize,
    /// Merged system-prompt length cap, workspace instructions included.
    pub prompt_max_chars: usize,
    /// Recursion cap for `@path` imports inside workspace instructions.
    pub prompt_import_max_depth: u32,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            provider: LlmProvider::default(),
            max_tokens: 8192,
            context_limit: 200_000,
            max_rounds: 3,
            qa_enabled: true,
            qa_timeout: Duration::from_secs(600),
            qa_output_max_chars: 50_000,
            run_tests: true,
            git_sync_enabled: true,
            git_sync_required: false,
            compaction_trigger_messages: 50,
            keep_messages: 20,
            prompt_max_chars: 24_000,
            prompt_import_max_depth: 5,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_provider(mut self, provider: LlmProvider) -> Self {
        self.provider = provider;
        if provider == LlmProvider::ZAI && self.model == "claude-sonnet-4-20250514" {
            self.model = std::env::var("ZAI_MODEL").unwrap_or_else(|_| "glm-5".to_string());
        }
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Load configuration from environment variables, falling back to
    /// [`RuntimeConfig::new`]'s defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Ok(model) = std::env::var("ORCH_MODEL") {
            config.model = model;
        }

        if let Ok(provider_str) = std::env::var("ORCH_PROVIDER") {
            if let Ok(provider) = provider_str.parse::<LlmProvider>() {
                config.provider = provider;
            }
        } else if std::env::var("ZAI_API_KEY").is_ok() {
            config.provider = LlmProvider::ZAI;
        } else if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            config.provider = LlmProvider::Anthropic;
        }

        if config.provider == LlmProvider::ZAI && config.model == "claude-sonnet-4-20250514" {
            config.model = std::env::var("ZAI_MODEL").unwrap_or_else(|_| "glm-5".to_string());
        }

        if let Ok(v) = std::env::var("ORCH_MAX_TOKENS") {
            if let Ok(val) = v.parse() {
                config.max_tokens = val;
            }
        }
        if let Ok(v) = std::env::var("ORCH_CONTEXT_LIMIT") {
            if let Ok(val) = v.parse() {
                config.context_limit = val;
            }
        }
        if let Ok(v) = std::env::var("ORCH_MAX_ROUNDS") {
            if let Ok(val) = v.parse() {
                config.max_rounds = val;
            }
        }
        if let Ok(v) = std::env::var("DEEPAGENTS_QA_ENABLED") {
            config.qa_enabled = v != "0" && v.to_lowercase() != "false";
        }
        if let Ok(v) = std::env::var("DEEPAGENTS_QA_TIMEOUT_S") {
            if let Ok(val) = v.parse() {
                config.qa_timeout = Duration::from_secs(val);
            }
        }
        if let Ok(v) = std::env::var("ORCH_GIT_SYNC_ENABLED") {
            config.git_sync_enabled = v != "0" && v.to_lowercase() != "false";
        }
        if let Ok(v) = std::env::var("ORCH_GIT_SYNC_REQUIRED") {
            config.git_sync_required = v == "1" || v.to_lowercase() == "true";
        }
        if let Ok(v) = std::env::var("ORCH_COMPACTION_TRIGGER_MESSAGES") {
            if let Ok(val) = v.parse() {
                config.compaction_trigger_messages = val;
            }
        }
        if let Ok(v) = std::env::var("ORCH_KEEP_MESSAGES") {
            if let Ok(val) = v.parse() {
                config.keep_messages = val;
            }
        }
        if let Ok(v) = std::env::var("ORCH_PROMPT_MAX_CHARS") {
            if let Ok(val) = v.parse::<usize>() {
                config.prompt_max_chars = val.max(4_000);
            }
        }
        if let Ok(v) = std::env::var("ORCH_PROMPT_IMPORT_MAX_DEPTH") {
            if let Ok(val) = v.parse::<u32>() {
                config.prompt_import_max_depth = val.max(1);
            }
        }

        config
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_provider_round_trips_through_str() {
        assert_eq!(LlmProvider::Anthropic.as_str(), "anthropic");
        assert_eq!("zai".parse(), Ok(LlmProvider::ZAI));
        assert_eq!("z.ai".parse(), Ok(LlmProvider::ZAI));
        assert!("made-up".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn defaults_match_spec() {
        let config = RuntimeConfig::new();
        assert_eq!(config.max_rounds, 3);
        assert!(config.qa_enabled);
        assert_eq!(config.qa_timeout, Duration::from_secs(600));
        assert_eq!(config.compaction_trigger_messages, 50);
        assert_eq!(config.keep_messages, 20);
        assert_eq!(config.prompt_max_chars, 24_000);
        assert_eq!(config.prompt_import_max_depth, 5);
    }

    #[test]
    fn switching_to_zai_swaps_default_model() {
        let config = RuntimeConfig::new().with_provider(LlmProvider::ZAI);
        assert_ne!(config.model, "claude-sonnet-4-20250514");
    }
}

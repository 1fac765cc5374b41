//! Agent runtime: drives one turn of the LLM <-> tool loop against a
//! [`ControllerState`](orch_core::ControllerState), backed by a sandboxed
//! [`Policy`] instead of a local filesystem.
//!
//! Split into focused submodules:
//! - **agent_loop** — request preparation, compaction, `run_turn`
//! - **llm** — streaming response handling
//! - **tools** — tool dispatch, HITL gating, sub-agent task spawning

mod agent_loop;
mod llm;
mod resume;
mod tools;

use std::sync::Arc;

use orch_core::{ContentBlock, Role, Session, SessionEvent, SessionStatus, Turn};
use orch_llm::{AnthropicProvider, Provider, ZaiProvider};
use orch_sandbox::Policy;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::{LlmProvider, RuntimeConfig};
use crate::error::{ControllerError, Result};
use crate::hitl::{self, HitlMiddleware};
use crate::tool_handler::{self, ToolInfo};

pub use agent_loop::RunOutcome;
pub use tools::{PausedToolCalls, ToolExecOutcome};

/// One agent's view of a session: the sandbox it edits, the model it
/// talks to, and the events it reports back through.
pub struct Runtime {
    pub session: Session,
    pub policy: Arc<Policy>,
    pub llm_client: Arc<dyn Provider>,
    pub event_tx: mpsc::Sender<SessionEvent>,
    pub config: RuntimeConfig,
    pub hitl_chain: Vec<Box<dyn HitlMiddleware>>,
    active_tools: Vec<ToolInfo>,
}

impl Runtime {
    pub fn new(session: Session, policy: Arc<Policy>, config: RuntimeConfig, event_tx: mpsc::Sender<SessionEvent>) -> Result<Self> {
        let llm_client = Self::create_provider(config.provider)?;
        Ok(Self::new_with_shared(session, policy, llm_client, config, event_tx))
    }

    /// Builds a sub-agent runtime sharing the parent's sandbox policy and
    /// LLM client, with its own session and event channel.
    pub fn new_with_shared(session: Session, policy: Arc<Policy>, llm_client: Arc<dyn Provider>, config: RuntimeConfig, event_tx: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            session,
            policy,
            llm_client,
            event_tx,
            config,
            hitl_chain: hitl::default_chain(),
            active_tools: tool_handler::available_tools(),
        }
    }

    fn create_provider(provider: LlmProvider) -> Result<Arc<dyn Provider>> {
        match provider {
            LlmProvider::Anthropic => {
                let anthropic = AnthropicProvider::from_env().map_err(|e| ControllerError::ProviderNotFound(format!("Anthropic: {e}")))?;
                Ok(Arc::new(anthropic))
            }
            LlmProvider::ZAI => {
                let zai = ZaiProvider::from_env().map_err(|e| ControllerError::ProviderNotFound(format!("ZAI: {e}")))?;
                Ok(Arc::new(zai))
            }
            LlmProvider::OpenAI => Err(ControllerError::ProviderNotFound(
                "OpenAI provider is not yet implemented. Use 'anthropic' or 'zai' instead.".to_string(),
            )),
            LlmProvider::Ollama => Err(ControllerError::ProviderNotFound(
                "Ollama provider is not yet implemented. Use 'anthropic' or 'zai' instead.".to_string(),
            )),
        }
    }

    pub async fn shutdown(&mut self) {
        info!("shutting down runtime for session {}", self.session.id.as_str());
        self.session.set_status(SessionStatus::Completed);
        let _ = self.event_tx.send(SessionEvent::status("Session ended")).await;
    }

    /// The user's original request, pulled from the first user turn.
    pub fn current_task(&self, messages: &[Turn]) -> String {
        messages
            .iter()
            .find(|t| t.role == Role::User)
            .and_then(|t| {
                t.blocks.iter().find_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.clone()),
                    _ => None,
                })
            })
            .unwrap_or_else(|| "No active task".to_string())
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn summarize_intent_truncates_long_message() {
        let message = "x".repeat(150);
        let trimmed = message.trim();
        let summary = if trimmed.len() > 100 { format!("{}...", &trimmed[..97]) } else { trimmed.to_string() };
        assert!(summary.ends_with("..."));
        assert_eq!(summary.len(), 100);
    }

    #[test]
    fn summarize_intent_keeps_short_message() {
        let message = "Hello world";
        let trimmed = message.trim();
        let summary = if trimmed.len() > 100 { format!("{}...", &trimmed[..97]) } else { trimmed.to_string() };
        assert_eq!(summary, "Hello world");
    }
}

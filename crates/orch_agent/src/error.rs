//! Error taxonomy for the controller, HITL middleware, QA engine, and runtime.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("LLM error: {0}")]
    LlmFailed(String),

    #[error("context overflow - token limit exceeded")]
    ContextOverflow,

    #[error("session error: {0}")]
    SessionError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] orch_sandbox::SandboxError),

    #[error("invalid HITL response: {0}")]
    Hitl(#[from] orch_core::HitlProtocolError),

    #[error("QA engine error: {0}")]
    Qa(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("checkpointer error: {0}")]
    CheckpointBackend(#[from] orch_core::OrchError),

    #[error("git sync error: {0}")]
    GitSync(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ControllerError>;

pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod hitl;
pub mod qa;
pub mod runtime;
pub mod stream;
pub mod tool_handler;

pub use config::{LlmProvider, RuntimeConfig};
pub use controller::{resume_controller, run_controller, CommitMessage, ControllerOutcome, GitSync, GitSyncResult, NoGitSync};
pub use error::{ControllerError, Result};
pub use runtime::{PausedToolCalls, RunOutcome, Runtime, ToolExecOutcome};

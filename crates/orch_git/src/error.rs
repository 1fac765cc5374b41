//! Error taxonomy for the Git Sync Engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git error: {0}")]
    Git2(#[from] git2::Error),
    #[error("sandbox error: {0}")]
    Sandbox(#[from] orch_sandbox::SandboxError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("git_pull_no_baseline: remote_sha={remote_sha}")]
    NoBaseline { remote_sha: String },
    #[error("push rejected after {0} rebase attempts")]
    PushRejected(u32),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GitError>;

//! Error taxonomy for the session manager.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum K8sError {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),
    #[error("sandbox not ready: timeout_s={0}")]
    SandboxNotReady(u64),
    #[error("sandbox backend error: {0}")]
    Backend(#[from] orch_sandbox::SandboxError),
    #[error("no backend cached for session {0}; call ensure_session first")]
    NoEnv(String),
}

pub type Result<T> = std::result::Result<T, K8sError>;

impl From<K8sError> for orch_core::OrchError {
    fn from(err: K8sError) -> Self {
        match err {
            K8sError::SandboxNotReady(timeout_s) => orch_core::OrchError::SandboxNotReady(format!("timeout_s={timeout_s}")),
            other => orch_core::OrchError::Other(anyhow::anyhow!(other.to_string())),
        }
    }
}

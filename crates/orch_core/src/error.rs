use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchError {
    #[error("session error: {0}")]
    Session(String),

    #[error("sandbox not ready: {0}")]
    SandboxNotReady(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, OrchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error() {
        let err = OrchError::Session("no such session".to_string());
        assert_eq!(err.to_string(), "session error: no such session");
    }

    #[test]
    fn test_sandbox_not_ready() {
        let err = OrchError::SandboxNotReady("timeout_s=180".to_string());
        assert!(err.to_string().contains("timeout_s=180"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = OrchError::from(io_err);
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json");
        let err = OrchError::from(json_err.unwrap_err());
        assert!(err.to_string().contains("expected value"));
    }
}

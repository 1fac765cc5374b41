use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("request to sandbox runtime timed out after {0}s")]
    Timeout(u64),

    #[error("sandbox runtime returned {status}: {body}")]
    RuntimeStatus { status: u16, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 decode error: {0}")]
    Base64(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;

//! Wire types for the sandbox runtime HTTP API (`/exec`, `/manifest`, `/download_many`, ...).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ExecRequest {
    pub command: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecResponse {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManifestEntry {
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
    pub mode: u32,
    pub mtime_ns: u64,
    pub link_target: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestResponse {
    pub entries: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadManyRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadedFile {
    pub path: String,
    pub content_b64: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadManyResponse {
    pub files: Vec<DownloadedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteB64Request {
    pub path: String,
    pub content_b64: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteB64Response {
    pub ok: bool,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse {
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// A downloaded or read-back file, ready to hand to a caller.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub path: String,
    pub content: Option<Vec<u8>>,
    pub error: Option<String>,
}

//! Wire and state types for the push/pull flows.

use serde::{Deserialize, Serialize};

/// Connection and scoping info for one sync call. `token` is handed only to
/// [`crate::askpass`], never interpolated into `remote_url`.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub remote_url: String,
    pub branch: String,
    pub token: Option<String>,
}

/// Paths excluded from every push, matched as prefixes against the
/// sandbox-relative path.
pub fn default_push_excludes() -> Vec<String> {
    vec![
        "node_modules/".to_string(),
        ".git/".to_string(),
        "dist/".to_string(),
        "build/".to_string(),
        ".cache/".to_string(),
        ".env".to_string(),
        ".env.".to_string(),
        ".orchestrator_snapshot.tgz".to_string(),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct PushOutcome {
    pub pushed: bool,
    pub commit_sha: Option<String>,
    pub stat: Option<String>,
    pub name_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub path: String,
    pub shadow_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullOutcome {
    pub remote_sha: String,
    pub updated_paths: Vec<String>,
    pub conflicts: Vec<ConflictEntry>,
}

/// Persisted per-sandbox state, read/written at `/.orchestrator/git_state.json`.
/// Renamed from the original system's `.amicable/git_state.json` path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitSyncState {
    pub remote_head_sha: Option<String>,
}

pub const STATE_PATH: &str = "/.orchestrator/git_state.json";

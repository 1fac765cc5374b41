use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chat::ChatHistoryRow;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deterministic 12-hex-char sandbox claim name derived from this
    /// session id: `<prefix>-<first 12 hex of sha256(session_id)>`, always
    /// a valid DNS-1123 label.
    pub fn claim_name(&self, prefix: &str) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let hex = hex_prefix(&digest, 12);
        format!("{prefix}-{hex}")
    }
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    let mut s = String::with_capacity(chars);
    for b in bytes {
        if s.len() >= chars {
            break;
        }
        s.push_str(&format!("{b:02x}"));
    }
    s.truncate(chars);
    s
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a session's current run. Distinct from
/// [`crate::controller::ControllerState::final_status`], which only covers
/// the outcome of one controller pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Running,
    Completed,
    Failed { error: String },
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// How much latitude the agent has before a destructive tool call requires
/// explicit human approval (see the HITL middleware).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    /// Default: destructive tool calls always pause for approval.
    Confirm,
    /// HITL is bypassed for this session, same as `Bypass` — kept as a
    /// distinct variant so a client can tell "the user accepted edits" apart
    /// from "HITL was disabled outright" in its own UI.
    AcceptEdits,
    /// HITL middleware is bypassed entirely for this session.
    Bypass,
}

impl Default for PermissionMode {
    fn default() -> Self {
        Self::Confirm
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitMetadata {
    pub repo_http_url: Option<String>,
    pub path_with_namespace: Option<String>,
    pub web_url: Option<String>,
}

/// The full conversational/edit context for one project (spec.md's central
/// entity). `session_id` doubles as the checkpointer's `thread_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub status: SessionStatus,
    pub user_sub: String,
    pub user_email: String,
    pub template_id: String,
    pub slug: String,
    pub git: GitMetadata,
    pub preview_url: Option<String>,
    pub claim_name: String,
    pub pending_hitl: bool,
    pub last_qa_failure: Option<String>,
    pub conversation_history: Vec<ChatHistoryRow>,
    pub conversation_summary: Option<String>,
    pub permission_mode: PermissionMode,
    pub thinking_level: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, user_sub: impl Into<String>, user_email: impl Into<String>, template_id: impl Into<String>, slug: impl Into<String>) -> Self {
        let claim_name = id.claim_name("sbx");
        Self {
            id,
            status: SessionStatus::Active,
            user_sub: user_sub.into(),
            user_email: user_email.into(),
            template_id: template_id.into(),
            slug: slug.into(),
            git: GitMetadata::default(),
            preview_url: None,
            claim_name,
            pending_hitl: false,
            last_qa_failure: None,
            conversation_history: Vec::new(),
            conversation_summary: None,
            permission_mode: PermissionMode::default(),
            thinking_level: None,
            created_at: Utc::now(),
        }
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, SessionStatus::Active | SessionStatus::Running)
    }

    pub fn bypasses_hitl(&self) -> bool {
        matches!(self.permission_mode, PermissionMode::AcceptEdits | PermissionMode::Bypass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_name_is_deterministic_and_dns_label() {
        let id = SessionId("sess-A".to_string());
        let a = id.claim_name("sbx");
        let b = id.claim_name("sbx");
        assert_eq!(a, b);
        assert!(a.starts_with("sbx-"));
        let hex = &a["sbx-".len()..];
        assert_eq!(hex.len(), 12);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn claim_name_differs_across_sessions() {
        let a = SessionId("sess-A".to_string()).claim_name("sbx");
        let b = SessionId("sess-B".to_string()).claim_name("sbx");
        assert_ne!(a, b);
    }

    #[test]
    fn session_id_serialization_roundtrip() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).unwrap();
        let decoded: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn session_status_serialization() {
        let status = SessionStatus::Failed { error: "boom".to_string() };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains(r#""type":"failed"#));
        assert!(json.contains("boom"));
    }

    #[test]
    fn new_session_is_active_and_not_pending_hitl() {
        let session = Session::new(SessionId::new(), "user|1", "a@b.com", "node-ts", "my-proj");
        assert!(session.is_active());
        assert!(!session.pending_hitl);
        assert!(!session.claim_name.is_empty());
    }

    #[test]
    fn bypass_permission_mode() {
        let mut session = Session::new(SessionId::new(), "u", "e", "t", "s");
        assert!(!session.bypasses_hitl());
        session.permission_mode = PermissionMode::Bypass;
        assert!(session.bypasses_hitl());
    }

    #[test]
    fn accept_edits_also_bypasses_hitl() {
        let mut session = Session::new(SessionId::new(), "u", "e", "t", "s");
        session.permission_mode = PermissionMode::AcceptEdits;
        assert!(session.bypasses_hitl());
    }
}

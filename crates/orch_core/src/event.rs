//! Upstream-facing session events: the controller and agent runtime emit
//! these; the stream adapter (C7) maps them onto outbound WebSocket frames.

use serde::{Deserialize, Serialize};

use crate::controller::{FinalStatus, QaResult};
use crate::hitl::InterruptRequest;
use crate::session::SessionStatus;
use crate::tool_call::{ToolResultData, ToolUse};
use crate::turn::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    TurnStart { role: Role },

    TextDelta { text: String },

    ThinkingDelta { thinking: String },

    ToolStart { tool_use: ToolUse },

    ToolDone {
        tool_use_id: String,
        result: ToolResultData,
    },

    /// A file under the sandbox root was created, edited, or deleted; the
    /// stream adapter turns this into an `UPDATE_FILE` frame.
    UpdateFile {
        path: String,
        content: Option<String>,
        deleted: bool,
    },

    /// The controller suspended the run and needs a human decision.
    HitlRequest { interrupt_id: String, request: InterruptRequest },

    QaResult(QaResult),

    GitSynced { commit_sha: String, pushed: bool },

    Status { message: String },

    TurnEnd,

    Error { error: String },

    SessionEnd { status: SessionStatus, final_status: Option<FinalStatus> },
}

impl SessionEvent {
    pub fn turn_start(role: Role) -> Self {
        SessionEvent::TurnStart { role }
    }

    pub fn text_delta(text: impl Into<String>) -> Self {
        SessionEvent::TextDelta { text: text.into() }
    }

    pub fn thinking_delta(thinking: impl Into<String>) -> Self {
        SessionEvent::ThinkingDelta {
            thinking: thinking.into(),
        }
    }

    pub fn tool_start(tool_use: ToolUse) -> Self {
        SessionEvent::ToolStart { tool_use }
    }

    pub fn tool_done(tool_use_id: impl Into<String>, result: ToolResultData) -> Self {
        SessionEvent::ToolDone {
            tool_use_id: tool_use_id.into(),
            result,
        }
    }

    pub fn update_file(path: impl Into<String>, content: Option<String>) -> Self {
        SessionEvent::UpdateFile {
            path: path.into(),
            content,
            deleted: false,
        }
    }

    pub fn delete_file(path: impl Into<String>) -> Self {
        SessionEvent::UpdateFile {
            path: path.into(),
            content: None,
            deleted: true,
        }
    }

    pub fn hitl_request(interrupt_id: impl Into<String>, request: InterruptRequest) -> Self {
        SessionEvent::HitlRequest {
            interrupt_id: interrupt_id.into(),
            request,
        }
    }

    pub fn qa_result(result: QaResult) -> Self {
        SessionEvent::QaResult(result)
    }

    pub fn git_synced(commit_sha: impl Into<String>, pushed: bool) -> Self {
        SessionEvent::GitSynced {
            commit_sha: commit_sha.into(),
            pushed,
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        SessionEvent::Status {
            message: message.into(),
        }
    }

    pub fn turn_end() -> Self {
        SessionEvent::TurnEnd
    }

    pub fn error(error: impl Into<String>) -> Self {
        SessionEvent::Error {
            error: error.into(),
        }
    }

    pub fn session_end(status: SessionStatus, final_status: Option<FinalStatus>) -> Self {
        SessionEvent::SessionEnd { status, final_status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_start() {
        let event = SessionEvent::turn_start(Role::User);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"turn_start"#));
        assert!(json.contains(r#""role":"user"#));
    }

    #[test]
    fn test_text_delta() {
        let event = SessionEvent::text_delta("hello world");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"text_delta"#));
        assert!(json.contains("hello world"));
    }

    #[test]
    fn test_update_file_edit() {
        let event = SessionEvent::update_file("/src/app.tsx", Some("export default {}".to_string()));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"update_file"#));
        assert!(json.contains(r#""deleted":false"#));
    }

    #[test]
    fn test_delete_file() {
        let event = SessionEvent::delete_file("/src/old.tsx");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""deleted":true"#));
        assert!(json.contains(r#""content":null"#));
    }

    #[test]
    fn test_hitl_request() {
        let request = InterruptRequest {
            action_requests: vec![],
            review_configs: vec![],
        };
        let event = SessionEvent::hitl_request("int-1", request);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"hitl_request"#));
        assert!(json.contains("int-1"));
    }

    #[test]
    fn test_qa_result_event() {
        let result = QaResult {
            command: "npm run build".to_string(),
            exit_code: 1,
            output: "error TS2304".to_string(),
            truncated: false,
        };
        let event = SessionEvent::qa_result(result);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"qa_result"#));
        assert!(json.contains("error TS2304"));
    }

    #[test]
    fn test_git_synced() {
        let event = SessionEvent::git_synced("abc123", true);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"git_synced"#));
        assert!(json.contains("abc123"));
    }

    #[test]
    fn test_turn_end() {
        let event = SessionEvent::turn_end();
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"turn_end"}"#);
    }

    #[test]
    fn test_session_end_completed() {
        let event = SessionEvent::session_end(SessionStatus::Completed, Some(FinalStatus::Success));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"session_end"#));
        assert!(json.contains(r#""type":"completed"#));
    }

    #[test]
    fn test_session_end_failed() {
        let event = SessionEvent::session_end(
            SessionStatus::Failed { error: "timeout".to_string() },
            Some(FinalStatus::FailedQa),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("timeout"));
        assert!(json.contains("failed_qa"));
    }

    #[test]
    fn test_all_event_types_serializable() {
        let events = vec![
            SessionEvent::turn_start(Role::User),
            SessionEvent::text_delta("text"),
            SessionEvent::thinking_delta("thinking"),
            SessionEvent::tool_start(ToolUse::new("t1", "execute", serde_json::json!({}))),
            SessionEvent::tool_done("t1", ToolResultData::success(serde_json::json!({}), 0)),
            SessionEvent::update_file("/a.ts", Some("x".to_string())),
            SessionEvent::status("status"),
            SessionEvent::turn_end(),
            SessionEvent::error("err"),
            SessionEvent::session_end(SessionStatus::Completed, None),
        ];

        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let decoded: SessionEvent = serde_json::from_str(&json).unwrap();
            let _ = format!("{:?}", decoded);
        }
    }
}

//! The wire frame every WebSocket message is wrapped in, client-to-server
//! and server-to-client alike.

use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameType {
    Init,
    User,
    AgentPartial,
    AgentFinal,
    UpdateInProgress,
    UpdateFile,
    UpdateCompleted,
    TraceEvent,
    HitlRequest,
    HitlResponse,
    Error,
    Ping,
    /// Reserved, not dispatched by this server yet.
    LoadCode,
    /// Reserved, not dispatched by this server yet.
    EditCode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsFrame {
    pub id: String,
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp_ms: i64,
    pub session_id: String,
}

impl WsFrame {
    pub fn new(frame_type: FrameType, session_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            frame_type,
            data,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            session_id: session_id.into(),
        }
    }

    pub fn error(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FrameType::Error, session_id, json!({ "message": message.into() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_type_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&FrameType::HitlResponse).unwrap();
        assert_eq!(json, r#""HITL_RESPONSE""#);
    }

    #[test]
    fn frame_round_trips_through_json() {
        let frame = WsFrame::new(FrameType::Ping, "sess-1", json!({}));
        let encoded = serde_json::to_string(&frame).unwrap();
        let decoded: WsFrame = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.session_id, "sess-1");
        assert_eq!(decoded.frame_type, FrameType::Ping);
    }

    #[test]
    fn client_frame_parses_with_type_tag() {
        let raw = r#"{"id":"1","type":"USER","data":{"text":"hi"},"timestamp_ms":0,"session_id":"s"}"#;
        let frame: WsFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.frame_type, FrameType::User);
        assert_eq!(frame.data["text"], "hi");
    }
}

//! Stream Adapter (C7): sits between the agent loop's internal event
//! channel and whatever ships events to the client, debouncing text
//! deltas, redacting sensitive tool payloads, and short-circuiting the
//! pipeline once a HITL request is emitted.

use once_cell::sync::Lazy;
use orch_core::SessionEvent;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const SECRET_KEYS: &[&str] = &["token", "api_key", "apikey", "password", "secret", "authorization"];

static BASE64_BLOB: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9+/]{80,}={0,2}").expect("valid regex"));

/// Forwards events from `rx` to `out_tx`, coalescing consecutive
/// `TextDelta`s so the client sees at most one update per `debounce`
/// window, and redacting tool payloads along the way. Stops forwarding
/// (but still closes `out_tx` cleanly) after a `HitlRequest` or
/// `SessionEnd`, matching the "pipeline breaks" behavior on interrupt.
pub async fn adapt_stream(mut rx: mpsc::Receiver<SessionEvent>, out_tx: mpsc::Sender<SessionEvent>, debounce: Duration) {
    let mut pending_text = String::new();
    let mut last_flush = Instant::now();

    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::TextDelta { text } => {
                pending_text.push_str(&text);
                if last_flush.elapsed() >= debounce {
                    if out_tx.send(SessionEvent::TextDelta { text: std::mem::take(&mut pending_text) }).await.is_err() {
                        return;
                    }
                    last_flush = Instant::now();
                }
            }
            other => {
                if !pending_text.is_empty() {
                    if out_tx.send(SessionEvent::TextDelta { text: std::mem::take(&mut pending_text) }).await.is_err() {
                        return;
                    }
                    last_flush = Instant::now();
                }

                let redacted = redact_event(other);
                let is_terminal = matches!(redacted, SessionEvent::HitlRequest { .. } | SessionEvent::SessionEnd { .. });
                let _ = out_tx.send(redacted).await;
                if is_terminal {
                    return;
                }
            }
        }
    }

    if !pending_text.is_empty() {
        let _ = out_tx.send(SessionEvent::TextDelta { text: pending_text }).await;
    }
}

/// Redacts secret-bearing fields and long base64 blobs from tool
/// start/done payloads; every other event passes through unchanged.
fn redact_event(event: SessionEvent) -> SessionEvent {
    match event {
        SessionEvent::ToolStart { mut tool_use } => {
            tool_use.args = redact_value(&tool_use.args);
            SessionEvent::ToolStart { tool_use }
        }
        SessionEvent::ToolDone { tool_use_id, mut result } => {
            result.output = redact_value(&result.output);
            SessionEvent::ToolDone { tool_use_id, result }
        }
        other => other,
    }
}

fn redact_value(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if SECRET_KEYS.iter().any(|s| k.to_lowercase().contains(s)) {
                    out.insert(k.clone(), JsonValue::String("[redacted]".to_string()));
                } else {
                    out.insert(k.clone(), redact_value(v));
                }
            }
            JsonValue::Object(out)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(redact_value).collect()),
        JsonValue::String(s) => JsonValue::String(BASE64_BLOB.replace_all(s, "[redacted-blob]").into_owned()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_core::{ToolResultData, ToolUse};

    #[tokio::test]
    async fn coalesces_rapid_text_deltas() {
        let (tx, rx) = mpsc::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let handle = tokio::spawn(adapt_stream(rx, out_tx, Duration::from_millis(200)));

        tx.send(SessionEvent::TextDelta { text: "hel".to_string() }).await.unwrap();
        tx.send(SessionEvent::TextDelta { text: "lo".to_string() }).await.unwrap();
        drop(tx);

        let mut texts = Vec::new();
        while let Some(event) = out_rx.recv().await {
            if let SessionEvent::TextDelta { text } = event {
                texts.push(text);
            }
        }
        handle.await.unwrap();

        assert_eq!(texts.join(""), "hello");
    }

    #[tokio::test]
    async fn stops_after_hitl_request() {
        let (tx, rx) = mpsc::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let handle = tokio::spawn(adapt_stream(rx, out_tx, Duration::from_millis(200)));

        tx.send(SessionEvent::hitl_request("int-1", orch_core::InterruptRequest { action_requests: vec![], review_configs: vec![] })).await.unwrap();
        tx.send(SessionEvent::status("should not be forwarded")).await.unwrap();
        drop(tx);

        let first = out_rx.recv().await.unwrap();
        assert!(matches!(first, SessionEvent::HitlRequest { .. }));
        assert!(out_rx.recv().await.is_none());
        handle.await.unwrap();
    }

    #[test]
    fn redacts_secret_keys_and_base64_blobs() {
        let blob = "A".repeat(100);
        let value = serde_json::json!({"api_key": "sk-abc", "output": blob});
        let redacted = redact_value(&value);
        assert_eq!(redacted["api_key"], "[redacted]");
        assert_eq!(redacted["output"], "[redacted-blob]");
    }

    #[test]
    fn redact_event_leaves_non_tool_events_untouched() {
        let event = SessionEvent::status("hello");
        let redacted = redact_event(event);
        assert!(matches!(redacted, SessionEvent::Status { message } if message == "hello"));
    }

    #[test]
    fn redact_event_cleans_tool_start_args() {
        let tool_use = ToolUse::new("id-1", "execute", serde_json::json!({"token": "abc123"}));
        let event = SessionEvent::ToolStart { tool_use };
        let redacted = redact_event(event);
        if let SessionEvent::ToolStart { tool_use } = redacted {
            assert_eq!(tool_use.args["token"], "[redacted]");
        } else {
            panic!("expected ToolStart");
        }
    }

    #[test]
    fn redact_event_cleans_tool_done_output() {
        let result = ToolResultData::success(serde_json::json!({"password": "hunter2"}), 10);
        let event = SessionEvent::ToolDone { tool_use_id: "id-1".to_string(), result };
        let redacted = redact_event(event);
        if let SessionEvent::ToolDone { result, .. } = redacted {
            assert_eq!(result.output["password"], "[redacted]");
        } else {
            panic!("expected ToolDone");
        }
    }
}

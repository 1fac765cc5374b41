//! Tool Journal: an append-only per-session audit trail used to author the
//! git commit message at sync time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub operation: String,
    pub target: String,
    pub metadata: JsonValue,
    pub ts_ms: i64,
}

/// Redacts values under keys that commonly carry secrets (tokens, api keys,
/// base64 blobs) before an entry is recorded, so the journal is safe to
/// fold into a commit message or log line.
fn redact(metadata: &JsonValue) -> JsonValue {
    const SECRET_KEYS: &[&str] = &["token", "api_key", "apikey", "password", "secret", "authorization"];
    match metadata {
        JsonValue::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if SECRET_KEYS.iter().any(|s| k.to_lowercase().contains(s)) {
                    out.insert(k.clone(), JsonValue::String("[redacted]".to_string()));
                } else {
                    out.insert(k.clone(), redact(v));
                }
            }
            JsonValue::Object(out)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolJournal {
    entries: Vec<JournalEntry>,
}

impl ToolJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, operation: impl Into<String>, target: impl Into<String>, metadata: JsonValue, now: DateTime<Utc>) {
        self.entries.push(JournalEntry {
            operation: operation.into(),
            target: target.into(),
            metadata: redact(&metadata),
            ts_ms: now.timestamp_millis(),
        });
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Clears the journal, returning everything recorded since the last
    /// clear — called at the start of each run and drained again at Git
    /// sync to build the commit message's "why" context.
    pub fn drain(&mut self) -> Vec<JournalEntry> {
        std::mem::take(&mut self.entries)
    }

    /// A short human-readable summary suitable for a commit message body.
    pub fn summary(&self) -> String {
        if self.entries.is_empty() {
            return "No tool operations recorded.".to_string();
        }
        self.entries
            .iter()
            .map(|e| format!("- {} {}", e.operation, e.target))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_secret_fields() {
        let meta = serde_json::json!({"command": "curl -H 'Authorization: x'", "api_key": "sk-123"});
        let mut journal = ToolJournal::new();
        journal.record("execute", "curl ...", meta, Utc::now());
        let entry = &journal.entries()[0];
        assert_eq!(entry.metadata["api_key"], "[redacted]");
        assert_eq!(entry.metadata["command"], "curl -H 'Authorization: x'");
    }

    #[test]
    fn drain_clears_and_returns_entries() {
        let mut journal = ToolJournal::new();
        journal.record("write", "/a.txt", serde_json::json!({}), Utc::now());
        journal.record("write", "/b.txt", serde_json::json!({}), Utc::now());
        let drained = journal.drain();
        assert_eq!(drained.len(), 2);
        assert!(journal.entries().is_empty());
    }

    #[test]
    fn summary_lists_operations() {
        let mut journal = ToolJournal::new();
        journal.record("execute", "npm run build", serde_json::json!({}), Utc::now());
        assert!(journal.summary().contains("execute npm run build"));
    }
}

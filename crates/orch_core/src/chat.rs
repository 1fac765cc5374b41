use serde::{Deserialize, Serialize};

/// Role for a [`ChatHistoryRow`]; narrower than [`crate::turn::Role`]
/// because system/tool-intermediate messages are filtered out before a
/// message becomes chat history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A derived projection of a controller's `messages[]`, capped at the last
/// N rows, suitable for rendering a conversation sidebar without replaying
/// tool-call internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistoryRow {
    pub role: ChatRole,
    pub text: String,
}

impl ChatHistoryRow {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Caps a chat history to at most the last `n` rows, dropping the oldest.
pub fn cap_history(rows: &mut Vec<ChatHistoryRow>, n: usize) {
    if rows.len() > n {
        let drop = rows.len() - n;
        rows.drain(0..drop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_history_drops_oldest() {
        let mut rows: Vec<ChatHistoryRow> = (0..5).map(|i| ChatHistoryRow::user(format!("{i}"))).collect();
        cap_history(&mut rows, 3);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].text, "2");
        assert_eq!(rows[2].text, "4");
    }

    #[test]
    fn cap_history_noop_when_under_limit() {
        let mut rows = vec![ChatHistoryRow::user("hi")];
        cap_history(&mut rows, 10);
        assert_eq!(rows.len(), 1);
    }
}

//! Context window management: token estimation and local compaction.

use orch_core::{ContentBlock, Role, SessionEvent, Turn};
use tokio::sync::mpsc;
use tracing::info;

/// True once the estimated token count crosses 85% of `context_limit`.
pub fn near_context_limit(messages: &[Turn], context_limit: u64) -> bool {
    let estimated_tokens = estimate_session_tokens(messages);
    let threshold = (context_limit as f64 * 0.85) as u64;
    estimated_tokens > threshold
}

/// Rough heuristic of ~4 characters per token across every block.
pub(crate) fn estimate_session_tokens(messages: &[Turn]) -> u64 {
    let mut char_count = 0usize;

    for turn in messages {
        for block in &turn.blocks {
            match block {
                ContentBlock::Text { text } => char_count += text.len(),
                ContentBlock::Thinking { thinking } => char_count += thinking.len(),
                ContentBlock::Error { error } => char_count += error.len(),
                ContentBlock::ToolUse { tool_use } => {
                    char_count += tool_use.name.len();
                    char_count += tool_use.args.to_string().len();
                }
                ContentBlock::ToolResult { tool_result } => {
                    char_count += tool_result.output.to_string().len();
                }
            }
        }
    }

    (char_count / 4) as u64
}

/// Compacts `messages` in place once the conversation passes
/// `compaction_trigger_messages`: everything except the last
/// `keep_messages` turns is collapsed into a single heuristic summary
/// turn. No external summarization service is involved - the summary is
/// just a truncated, role-prefixed join of the dropped turns' text.
pub async fn compress_context(messages: &mut Vec<Turn>, compaction_trigger_messages: usize, keep_messages: usize, event_tx: &mpsc::Sender<SessionEvent>) -> bool {
    if messages.len() <= compaction_trigger_messages {
        return false;
    }

    let _ = event_tx.send(SessionEvent::status("Context near limit, compacting history...")).await;

    let keep_count = keep_messages.min(messages.len()).max(1);
    let split_at = messages.len() - keep_count;
    let dropped: Vec<Turn> = messages.drain(..split_at).collect();
    let summary = summarize_turns(&dropped);

    let summary_turn = Turn::system().with_block(ContentBlock::text(format!("[Context Summary]\n{summary}")));
    messages.insert(0, summary_turn);

    info!("compacted {} turns into one summary turn, {} turns remain", dropped.len(), messages.len());
    let _ = event_tx.send(SessionEvent::status(format!("Context compacted. {} turns remaining.", messages.len()))).await;

    true
}

/// Role-prefixed, length-capped join of each turn's text content.
pub(crate) fn summarize_turns(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| {
            let role = match t.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::System => "System",
                Role::Tool => "Tool",
            };

            let content: String = t
                .blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");

            format!("**{role}**: {}", content.chars().take(500).collect::<String>())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_context_limit_false_for_small_history() {
        let messages = vec![Turn::user().with_block(ContentBlock::text("hello"))];
        assert!(!near_context_limit(&messages, 100_000));
    }

    #[test]
    fn near_context_limit_true_for_large_history() {
        let messages = vec![Turn::user().with_block(ContentBlock::text("x".repeat(400_000)))];
        assert!(near_context_limit(&messages, 100_000));
    }

    #[test]
    fn estimate_session_tokens_uses_four_chars_per_token() {
        let messages = vec![Turn::user().with_block(ContentBlock::text("x".repeat(400)))];
        assert_eq!(estimate_session_tokens(&messages), 100);
    }

    #[test]
    fn summarize_turns_includes_role_and_text() {
        let turns = vec![
            Turn::user().with_block(ContentBlock::text("User message")),
            Turn::assistant().with_block(ContentBlock::text("Assistant response")),
        ];
        let summary = summarize_turns(&turns);
        assert!(summary.contains("User"));
        assert!(summary.contains("Assistant"));
        assert!(summary.contains("User message"));
        assert!(summary.contains("Assistant response"));
    }

    #[tokio::test]
    async fn compress_context_below_trigger_is_noop() {
        let mut messages = vec![Turn::user().with_block(ContentBlock::text("hi"))];
        let (tx, _rx) = mpsc::channel(8);
        let compacted = compress_context(&mut messages, 50, 20, &tx).await;
        assert!(!compacted);
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn compress_context_keeps_last_n_and_adds_summary() {
        let mut messages: Vec<Turn> = (0..60).map(|i| Turn::user().with_block(ContentBlock::text(format!("turn {i}")))).collect();
        let (tx, _rx) = mpsc::channel(8);
        let compacted = compress_context(&mut messages, 50, 20, &tx).await;
        assert!(compacted);
        // 1 summary turn + 20 kept turns
        assert_eq!(messages.len(), 21);
        assert!(matches!(messages[0].role, Role::System));
        assert!(messages.last().unwrap().blocks.iter().any(|b| matches!(b, ContentBlock::Text { text } if text.contains("turn 59"))));
    }
}

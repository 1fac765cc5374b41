//! HITL Middleware (C5): scans proposed tool calls for destructive
//! operations and, on a match, produces a single interrupt payload instead
//! of letting the call reach the sandbox.

use once_cell::sync::Lazy;
use regex::Regex;

use orch_core::{ActionRequest, AllowedDecision, InterruptRequest, ReviewConfig, ToolUse};

/// One tool call flagged by the chain, paired with the index it held in
/// the original `tool_uses` list so a later resume can splice a decision
/// back onto the right call.
pub struct FlaggedCall {
    pub index: usize,
    pub action: ActionRequest,
    pub review: ReviewConfig,
}

pub trait HitlMiddleware: Send + Sync {
    /// Returns every tool call in `tool_uses` this middleware wants a human
    /// to review, in order.
    fn flag(&self, tool_uses: &[ToolUse]) -> Vec<FlaggedCall>;
}

static DESTRUCTIVE_EXECUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|[;&|(]|\s)(rm|unlink|rmdir|shred)\b|(^|[;&|(]|\s)git\s+clean\b|(^|[;&|(]|\s)find\s+.*-delete\b")
        .expect("destructive-execute pattern must compile")
});

/// Flags `execute` tool calls whose command matches a dangerous-delete
/// heuristic: `rm|unlink|rmdir|shred` at a shell boundary, `git clean`, or
/// `find ... -delete`.
pub struct DestructiveExecuteHitl;

impl HitlMiddleware for DestructiveExecuteHitl {
    fn flag(&self, tool_uses: &[ToolUse]) -> Vec<FlaggedCall> {
        tool_uses
            .iter()
            .enumerate()
            .filter(|(_, t)| t.name == "execute")
            .filter_map(|(i, t)| {
                let cmd = t.args.get("command").and_then(|v| v.as_str())?;
                if !DESTRUCTIVE_EXECUTE_RE.is_match(cmd) {
                    return None;
                }
                Some(FlaggedCall {
                    index: i,
                    action: ActionRequest {
                        name: t.name.clone(),
                        args: t.args.clone(),
                        description: format!("run destructive command: {cmd}"),
                    },
                    review: ReviewConfig {
                        action_name: t.name.clone(),
                        allowed_decisions: vec![
                            AllowedDecision::Approve,
                            AllowedDecision::Edit,
                            AllowedDecision::Reject,
                        ],
                    },
                })
            })
            .collect()
    }
}

/// Flags calls to `db_drop_table` / `db_truncate_table` unconditionally.
pub struct DestructiveDbHitl;

impl HitlMiddleware for DestructiveDbHitl {
    fn flag(&self, tool_uses: &[ToolUse]) -> Vec<FlaggedCall> {
        tool_uses
            .iter()
            .enumerate()
            .filter(|(_, t)| t.name == "db_drop_table" || t.name == "db_truncate_table")
            .map(|(i, t)| FlaggedCall {
                index: i,
                action: ActionRequest {
                    name: t.name.clone(),
                    args: t.args.clone(),
                    description: format!("{} on the project database", t.name),
                },
                review: ReviewConfig {
                    action_name: t.name.clone(),
                    allowed_decisions: vec![
                        AllowedDecision::Approve,
                        AllowedDecision::Edit,
                        AllowedDecision::Reject,
                    ],
                },
            })
            .collect()
    }
}

pub fn default_chain() -> Vec<Box<dyn HitlMiddleware>> {
    vec![Box::new(DestructiveExecuteHitl), Box::new(DestructiveDbHitl)]
}

/// Runs every middleware in `chain` over `tool_uses`, merging all matches
/// into one `{action_requests[], review_configs[]}` interrupt payload.
/// Returns `None` if nothing matched. Flagged indices are returned
/// alongside so a caller can splice resumed decisions back onto the
/// original calls in order.
pub fn scan(chain: &[Box<dyn HitlMiddleware>], tool_uses: &[ToolUse]) -> Option<(InterruptRequest, Vec<usize>)> {
    let mut flagged: Vec<FlaggedCall> = chain.iter().flat_map(|m| m.flag(tool_uses)).collect();
    if flagged.is_empty() {
        return None;
    }
    flagged.sort_by_key(|f| f.index);
    flagged.dedup_by_key(|f| f.index);

    let indices = flagged.iter().map(|f| f.index).collect();
    let action_requests = flagged.iter().map(|f| f.action.clone()).collect();
    let review_configs = flagged.iter().map(|f| f.review.clone()).collect();

    Some((
        InterruptRequest {
            action_requests,
            review_configs,
        },
        indices,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flags_rm_rf_at_shell_boundary() {
        let tools = vec![ToolUse::new("t1", "execute", json!({"command": "rm -rf node_modules"}))];
        let chain = default_chain();
        let (req, idx) = scan(&chain, &tools).expect("should flag");
        assert_eq!(idx, vec![0]);
        assert_eq!(req.action_requests[0].name, "execute");
    }

    #[test]
    fn does_not_flag_word_containing_rm() {
        let tools = vec![ToolUse::new("t1", "execute", json!({"command": "npm run build"}))];
        let chain = default_chain();
        assert!(scan(&chain, &tools).is_none());
    }

    #[test]
    fn flags_git_clean_and_find_delete() {
        let tools = vec![
            ToolUse::new("t1", "execute", json!({"command": "git clean -fdx"})),
            ToolUse::new("t2", "execute", json!({"command": "find . -name '*.tmp' -delete"})),
        ];
        let chain = default_chain();
        let (req, idx) = scan(&chain, &tools).expect("should flag");
        assert_eq!(idx, vec![0, 1]);
        assert_eq!(req.action_requests.len(), 2);
    }

    #[test]
    fn flags_db_drop_table_unconditionally() {
        let tools = vec![ToolUse::new("t1", "db_drop_table", json!({"table": "users"}))];
        let chain = default_chain();
        let (req, _) = scan(&chain, &tools).expect("should flag");
        assert_eq!(req.review_configs[0].action_name, "db_drop_table");
    }

    #[test]
    fn does_not_flag_safe_calls() {
        let tools = vec![ToolUse::new("t1", "write_file", json!({"path": "/src/a.ts", "content": "x"}))];
        let chain = default_chain();
        assert!(scan(&chain, &tools).is_none());
    }
}

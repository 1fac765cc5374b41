//! Controller State (C4): the checkpointable record driving the
//! deepagents_edit → qa_validate → (heal | git_sync) graph.

use serde::{Deserialize, Serialize};

use crate::tool_call::ToolUse;
use crate::turn::Turn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaResult {
    pub command: String,
    pub exit_code: i32,
    pub output: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Success,
    FailedQa,
    PausedForApproval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerState {
    pub messages: Vec<Turn>,
    pub attempt: u32,
    pub qa_passed: bool,
    pub qa_results: Vec<QaResult>,
    pub git_pushed: bool,
    pub git_last_commit: Option<String>,
    pub git_error: Option<String>,
    pub final_status: Option<FinalStatus>,

    /// The non-task tool calls from the paused turn, in their original
    /// order, restored so a resume can re-derive which ones need a
    /// decision. Empty outside of a pause.
    #[serde(default)]
    pub pending_regular_tools: Vec<ToolUse>,
    /// The `task` tool calls from the paused turn; HITL never gates these,
    /// so they run once the regular tools are resolved.
    #[serde(default)]
    pub pending_task_tools: Vec<ToolUse>,
    /// Indices into `pending_regular_tools` that were actually flagged;
    /// `decisions` on resume must line up with this list, not the full
    /// `pending_regular_tools` list.
    #[serde(default)]
    pub pending_flagged_indices: Vec<usize>,

    /// The project kind detected from the sandbox's manifest the last time
    /// QA ran, carried across nodes so a later self-heal message can give a
    /// stack-specific dependency-install hint instead of a generic one.
    #[serde(default)]
    pub project_kind: Option<String>,
    /// Whether the most recent QA failure was classified as environmental
    /// (missing command/dependency, not something the agent's edit broke).
    #[serde(default)]
    pub qa_environmental: bool,
}

impl ControllerState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            attempt: 0,
            qa_passed: false,
            qa_results: Vec::new(),
            git_pushed: false,
            git_last_commit: None,
            git_error: None,
            final_status: None,
            pending_regular_tools: Vec::new(),
            pending_task_tools: Vec::new(),
            pending_flagged_indices: Vec::new(),
            project_kind: None,
            qa_environmental: false,
        }
    }

    /// Clears any paused-tool-call state, called once a resume has either
    /// consumed it or the run is abandoned.
    pub fn clear_pending_tools(&mut self) {
        self.pending_regular_tools.clear();
        self.pending_task_tools.clear();
        self.pending_flagged_indices.clear();
    }

    /// `attempt <= max_rounds` invariant, checked before entering another
    /// self-heal round.
    pub fn can_self_heal(&self, max_rounds: u32) -> bool {
        self.attempt < max_rounds
    }

    pub fn push_message(&mut self, turn: Turn) {
        self.messages.push(turn);
    }

    pub fn last_qa_failure(&self) -> Option<&QaResult> {
        self.qa_results.iter().rev().find(|r| r.exit_code != 0)
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_self_heal_respects_max_rounds() {
        let mut state = ControllerState::new();
        assert!(state.can_self_heal(3));
        state.attempt = 3;
        assert!(!state.can_self_heal(3));
    }

    #[test]
    fn last_qa_failure_finds_most_recent_nonzero() {
        let mut state = ControllerState::new();
        state.qa_results.push(QaResult { command: "lint".to_string(), exit_code: 0, output: String::new(), truncated: false });
        state.qa_results.push(QaResult { command: "build".to_string(), exit_code: 1, output: "error".to_string(), truncated: false });
        let failure = state.last_qa_failure().unwrap();
        assert_eq!(failure.command, "build");
    }

    #[test]
    fn default_state_has_no_final_status() {
        let state = ControllerState::default();
        assert!(state.final_status.is_none());
        assert!(!state.qa_passed);
        assert_eq!(state.attempt, 0);
    }
}

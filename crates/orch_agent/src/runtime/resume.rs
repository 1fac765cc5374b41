//! Resuming a paused turn after a `HITL_RESPONSE`: apply each decision to
//! the tool call it answers, run the task calls that were never gated, and
//! hand control back to the normal assistant/tool loop.

use orch_core::{ControllerState, Decision, DecisionType, HitlProtocolError, ToolResultData, ToolUse};
use serde_json::json;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{ControllerError, Result};
use crate::tool_handler;

use super::{agent_loop::RunOutcome, Runtime};

impl Runtime {
    /// Consumes `state`'s paused tool calls, applies `decisions` (one per
    /// flagged index, in order), executes everything else normally, and
    /// continues the turn loop so the model sees the tool results.
    pub async fn resume_after_hitl(&mut self, state: &mut ControllerState, decisions: Vec<Decision>, cancel: Option<CancellationToken>) -> Result<RunOutcome> {
        let regular_tools = std::mem::take(&mut state.pending_regular_tools);
        let task_tools = std::mem::take(&mut state.pending_task_tools);
        let flagged_indices = std::mem::take(&mut state.pending_flagged_indices);

        if decisions.len() != flagged_indices.len() {
            return Err(ControllerError::Hitl(HitlProtocolError::DecisionCountMismatch {
                expected: flagged_indices.len(),
                got: decisions.len(),
            }));
        }

        let decision_by_index: HashMap<usize, Decision> = flagged_indices.into_iter().zip(decisions).collect();

        let mut results = Vec::with_capacity(regular_tools.len() + task_tools.len());

        for (i, tool_use) in regular_tools.into_iter().enumerate() {
            let result = match decision_by_index.get(&i) {
                Some(decision) => self.apply_decision(decision, tool_use.clone()).await?,
                None => tool_handler::handle_tool_call(tool_use.clone(), &self.policy, &self.event_tx).await?,
            };
            results.push((tool_use, result));
        }

        for tool_use in task_tools {
            info!("running task: {}", tool_use.args.get("description").and_then(|v| v.as_str()).unwrap_or("sub-task"));
            let result = self.run_task_tool(tool_use.clone()).await?;
            results.push((tool_use, result));
        }

        let turn = tool_handler::create_tool_result_turn(&results);
        state.push_message(turn);

        self.run_turn(state, cancel).await
    }

    /// Runs (or skips) one flagged tool call according to its decision.
    async fn apply_decision(&mut self, decision: &Decision, tool_use: ToolUse) -> Result<ToolResultData> {
        match decision.kind {
            DecisionType::Reject => Ok(ToolResultData::error(
                json!({
                    "rejected": true,
                    "message": decision.message.clone().unwrap_or_else(|| "rejected by reviewer".to_string()),
                }),
                0,
            )),
            DecisionType::Edit => {
                let effective = match &decision.edited_action {
                    Some(edited) => ToolUse::new(&tool_use.id, &edited.name, edited.args.clone()),
                    None => tool_use,
                };
                tool_handler::handle_tool_call(effective, &self.policy, &self.event_tx).await
            }
            DecisionType::Approve => tool_handler::handle_tool_call(tool_use, &self.policy, &self.event_tx).await,
        }
    }
}

//! Request preparation, compaction, and the assistant/tool turn loop.

use orch_core::{ControllerState, PendingHitl};
use orch_llm::types::GenerateRequest;
use tokio_util::sync::CancellationToken;

use crate::context::{self, near_context_limit};
use crate::error::{ControllerError, Result};

use super::{Runtime, ToolExecOutcome};

/// What happened at the end of one `run_turn` call.
#[derive(Debug)]
pub enum RunOutcome {
    /// The model stopped requesting tools; the turn is over.
    Done,
    /// A tool call was flagged by HITL middleware; the caller must resolve
    /// `pending` before resuming.
    Paused(PendingHitl),
}

impl Runtime {
    /// Compacts `messages` if needed, then builds a complete request for
    /// the configured model.
    pub(crate) async fn prepare_llm_call(&self, messages: &mut Vec<orch_core::Turn>) -> Result<GenerateRequest> {
        if near_context_limit(messages, self.config.context_limit) {
            context::compress_context(messages, self.config.compaction_trigger_messages, self.config.keep_messages, &self.event_tx).await;
        }

        let system_prompt = context::build_system_prompt(&self.active_tools, &self.policy, self.config.prompt_max_chars, self.config.prompt_import_max_depth).await;
        let llm_messages = context::build_messages(&system_prompt, &self.session, messages);

        Ok(context::build_generate_request(&self.config.model, llm_messages, &self.active_tools, self.config.max_tokens))
    }

    /// Drives `state` forward: stream one assistant turn, then, as long as
    /// it requests tools and none are flagged for approval, execute them
    /// and stream again. Returns as soon as the model replies with no
    /// tool calls, or a tool call is paused for human review.
    pub async fn run_turn(&mut self, state: &mut ControllerState, cancel: Option<CancellationToken>) -> Result<RunOutcome> {
        loop {
            if cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                return Err(ControllerError::Cancelled);
            }

            let request = self.prepare_llm_call(&mut state.messages).await?;
            let (assistant_turn, tool_uses) = self.stream_llm_response(request, cancel.clone()).await?;
            state.push_message(assistant_turn);

            if tool_uses.is_empty() {
                return Ok(RunOutcome::Done);
            }

            match self.execute_tool_calls(tool_uses).await? {
                ToolExecOutcome::Results(turn) => state.push_message(turn),
                ToolExecOutcome::Paused(pending, paused_calls) => {
                    state.pending_regular_tools = paused_calls.regular_tools;
                    state.pending_task_tools = paused_calls.task_tools;
                    state.pending_flagged_indices = paused_calls.flagged_indices;
                    return Ok(RunOutcome::Paused(pending));
                }
            }
        }
    }
}

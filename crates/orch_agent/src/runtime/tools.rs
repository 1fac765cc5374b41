//! Tool call execution, HITL gating, and sub-agent task spawning.

use std::time::Instant;

use observability::{agent_span, record_duration, record_error};
use orch_core::{ContentBlock, PendingHitl, Role, SessionEvent, ToolResultData, ToolUse, Turn};
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{ControllerError, Result};
use crate::hitl;
use crate::tool_handler;

use super::Runtime;

/// The original call split, preserved so a resume can apply decisions to
/// exactly the calls that were paused.
#[derive(Debug, Clone)]
pub struct PausedToolCalls {
    pub regular_tools: Vec<ToolUse>,
    pub task_tools: Vec<ToolUse>,
    pub flagged_indices: Vec<usize>,
}

/// What happened after dispatching a batch of tool calls.
#[derive(Debug)]
pub enum ToolExecOutcome {
    /// Every call ran; this is the tool-result turn to append.
    Results(Turn),
    /// A destructive call was flagged; execution did not proceed.
    Paused(PendingHitl, PausedToolCalls),
}

impl Runtime {
    /// Splits `task` delegation calls from regular tool calls, checks the
    /// regular ones against the HITL chain, and either dispatches
    /// everything or pauses for human review.
    pub(crate) async fn execute_tool_calls(&mut self, tool_uses: Vec<ToolUse>) -> Result<ToolExecOutcome> {
        let span = tracing::info_span!(
            "runtime.execute_tool_calls",
            session.id = %self.session.id.as_str(),
            tool_count = tool_uses.len(),
        );
        let _guard = span.enter();
        info!("executing {} tool calls", tool_uses.len());

        let mut task_tools = Vec::new();
        let mut regular_tools = Vec::new();
        for tool_use in tool_uses {
            if tool_use.name == "task" {
                task_tools.push(tool_use);
            } else {
                regular_tools.push(tool_use);
            }
        }

        if !self.session.bypasses_hitl() && !regular_tools.is_empty() {
            if let Some((request, flagged_indices)) = hitl::scan(&self.hitl_chain, &regular_tools) {
                let interrupt_id = uuid::Uuid::new_v4().to_string();
                let _ = self.event_tx.send(SessionEvent::hitl_request(interrupt_id.clone(), request.clone())).await;
                let paused = PausedToolCalls { regular_tools, task_tools, flagged_indices };
                return Ok(ToolExecOutcome::Paused(PendingHitl::new(interrupt_id, request), paused));
            }
        }

        let mut results = Vec::with_capacity(task_tools.len() + regular_tools.len());

        for tool_use in regular_tools {
            let result = match tool_handler::handle_tool_call(tool_use.clone(), &self.policy, &self.event_tx).await {
                Ok(r) => r,
                Err(e) => {
                    record_error(&e);
                    return Err(e);
                }
            };
            results.push((tool_use, result));
        }

        for tool_use in task_tools {
            info!("running task: {}", tool_use.args.get("description").and_then(|v| v.as_str()).unwrap_or("sub-task"));

            let result = match self.run_task_tool(tool_use.clone()).await {
                Ok(r) => r,
                Err(e) => {
                    record_error(&e);
                    return Err(e);
                }
            };
            results.push((tool_use, result));
        }

        Ok(ToolExecOutcome::Results(tool_handler::create_tool_result_turn(&results)))
    }

    /// Runs a single `task` tool call by spawning a sub-agent runtime that
    /// shares this runtime's sandbox policy and LLM client.
    pub(super) async fn run_task_tool(&self, tool: ToolUse) -> Result<ToolResultData> {
        let span = agent_span!("task", "run_task_tool");
        let _guard = span.enter();
        let start = Instant::now();

        let prompt = tool
            .args
            .get("prompt")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ControllerError::ToolFailed { tool: "task".to_string(), message: "missing 'prompt' argument".to_string() })?
            .to_string();

        let description = tool.args.get("description").and_then(|v| v.as_str()).unwrap_or("sub-task").to_string();

        let _ = self.event_tx.send(SessionEvent::tool_start(tool.clone())).await;
        let _ = self.event_tx.send(SessionEvent::status(format!("Sub-agent: {description}"))).await;

        let (sub_tx, mut sub_rx) = mpsc::channel::<SessionEvent>(100);
        let fwd_tx = self.event_tx.clone();
        let fwd_handle = tokio::spawn(async move {
            while let Some(event) = sub_rx.recv().await {
                let _ = fwd_tx.send(event).await;
            }
        });

        let sub_session = orch_core::Session::new(
            orch_core::SessionId::new(),
            self.session.user_sub.clone(),
            self.session.user_email.clone(),
            self.session.template_id.clone(),
            format!("{}-sub", self.session.slug),
        );

        let mut sub_config = self.config.clone();
        sub_config.max_rounds = 1;

        let mut sub_runtime = Runtime::new_with_shared(sub_session, self.policy.clone(), self.llm_client.clone(), sub_config, sub_tx);

        let mut sub_state = orch_core::ControllerState::new();
        sub_state.push_message(Turn::user().with_block(ContentBlock::text(&prompt)));

        let outcome = Box::pin(sub_runtime.run_turn(&mut sub_state, None)).await;
        fwd_handle.abort();
        let outcome = outcome?;

        let summary = sub_state
            .messages
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .and_then(|t| t.blocks.iter().find_map(|b| if let ContentBlock::Text { text } = b { Some(text.clone()) } else { None }))
            .unwrap_or_else(|| format!("Task completed: {outcome:?}"));

        let duration = start.elapsed();
        let duration_ms = duration.as_millis() as u64;
        record_duration("task.duration_ms", duration);

        let output = serde_json::json!({
            "description": description,
            "summary": summary,
            "duration_ms": duration_ms,
        });

        let tool_result = ToolResultData::success(output, duration_ms);
        let _ = self.event_tx.send(SessionEvent::tool_done(tool.id.clone(), tool_result.clone())).await;

        Ok(tool_result)
    }
}

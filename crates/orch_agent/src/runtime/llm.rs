//! LLM streaming and response assembly.

use std::collections::HashMap;
use std::time::Instant;

use futures::StreamExt;
use observability::record_duration;
use orch_core::{ContentBlock, Role, SessionEvent, TokenUsage, ToolUse, Turn};
use orch_llm::types::{GenerateRequest, StreamEvent};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{ControllerError, Result};

use super::Runtime;

impl Runtime {
    /// Streams one assistant response, forwarding deltas as events, and
    /// returns the finished turn plus any tool calls it requested. Stream
    /// errors and cancellation both surface as `Err`.
    pub(crate) async fn stream_llm_response(&self, request: GenerateRequest, cancel: Option<CancellationToken>) -> Result<(Turn, Vec<ToolUse>)> {
        let span = tracing::info_span!("runtime.stream_llm", session.id = %self.session.id.as_str());
        let _guard = span.enter();
        info!("streaming LLM response");

        let _ = self.event_tx.send(SessionEvent::turn_start(Role::Assistant)).await;

        let start = Instant::now();
        let mut stream = self.llm_client.stream(request).await.map_err(|e| ControllerError::LlmFailed(e.to_string()))?;

        let mut text_content = String::new();
        let mut thinking_content = String::new();
        let mut tool_calls: HashMap<String, (String, String)> = HashMap::new();
        let mut usage = None;

        loop {
            let event_result = if let Some(c) = cancel.clone() {
                tokio::select! {
                    biased;
                    _ = c.cancelled() => return Err(ControllerError::Cancelled),
                    ev = stream.next() => ev,
                }
            } else {
                stream.next().await
            };
            let Some(event_result) = event_result else {
                break;
            };

            match event_result {
                Ok(StreamEvent::TextDelta { delta, .. }) => {
                    text_content.push_str(&delta);
                    let _ = self.event_tx.send(SessionEvent::text_delta(&delta)).await;
                }
                Ok(StreamEvent::ReasoningDelta { delta, .. }) => {
                    thinking_content.push_str(&delta);
                    let _ = self.event_tx.send(SessionEvent::thinking_delta(&delta)).await;
                }
                Ok(StreamEvent::ToolCallStart { id, name }) => {
                    info!("tool call started: {} ({})", name, id);
                    tool_calls.insert(id, (name, String::new()));
                }
                Ok(StreamEvent::ToolCallDelta { id, delta }) => {
                    if let Some((_, args)) = tool_calls.get_mut(&id) {
                        args.push_str(&delta);
                    }
                }
                Ok(StreamEvent::ToolCallEnd { id, name, arguments }) => {
                    info!("tool call completed: {} ({})", name, id);
                    tool_calls.insert(id, (name, arguments.to_string()));
                }
                Ok(StreamEvent::Finish { usage: u, reason }) => {
                    info!("LLM stream finished: {:?}", reason);
                    usage = Some(u);
                }
                Err(e) => {
                    error!("stream error: {}", e);
                    return Err(ControllerError::LlmFailed(e.to_string()));
                }
            }
        }

        let duration = start.elapsed();
        record_duration("llm.stream_duration_ms", duration);

        let prompt_tokens = usage.as_ref().map(|u| u.prompt_tokens as u64).unwrap_or(0);
        let completion_tokens = usage.as_ref().map(|u| u.completion_tokens as u64).unwrap_or(0);

        let mut assistant_turn = Turn::assistant().with_token_usage(TokenUsage::new(prompt_tokens, completion_tokens));

        if !thinking_content.is_empty() {
            assistant_turn = assistant_turn.with_block(ContentBlock::thinking(&thinking_content));
        }
        if !text_content.is_empty() {
            assistant_turn = assistant_turn.with_block(ContentBlock::text(&text_content));
        }

        let tool_uses: Vec<ToolUse> = tool_calls
            .into_iter()
            .map(|(id, (name, args_json))| {
                let args: serde_json::Value = match serde_json::from_str(&args_json) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("failed to parse tool call arguments for {} (id={}): {} (raw: {})", name, id, e, &args_json[..args_json.len().min(200)]);
                        serde_json::json!({"__raw_arguments": args_json, "__parse_error": e.to_string()})
                    }
                };
                ToolUse::new(&id, &name, args)
            })
            .collect();

        for tool_use in &tool_uses {
            assistant_turn = assistant_turn.with_block(ContentBlock::tool_use(tool_use.clone()));
        }

        Ok((assistant_turn, tool_uses))
    }
}

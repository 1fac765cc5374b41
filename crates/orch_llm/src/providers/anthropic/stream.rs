//! Anthropic Messages API streaming support (SSE `content_block_delta`
//! events carrying `text_delta` / `thinking_delta` / `input_json_delta`).

use std::collections::HashMap;

use futures::stream::StreamExt;
use reqwest_eventsource::{Event, EventSource};

use super::convert::parse_stop_reason;
use super::types::{AnthropicStreamBlockStart, AnthropicStreamDelta, AnthropicStreamEvent};
use crate::error::{Error, Result};
use crate::types::{GenerateStream, StreamEvent, Usage};

#[derive(Debug, Clone, Default)]
struct ActiveBlock {
    id: String,
    name: String,
}

pub async fn create_stream(mut event_source: EventSource) -> Result<GenerateStream> {
    let stream = async_stream::stream! {
        let mut blocks: HashMap<u32, ActiveBlock> = HashMap::new();
        let mut input_tokens: u32 = 0;

        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => {
                    match serde_json::from_str::<AnthropicStreamEvent>(&message.data) {
                        Ok(parsed) => {
                            for stream_event in process_event(parsed, &mut blocks, &mut input_tokens) {
                                yield Ok(stream_event);
                            }
                        }
                        Err(e) => {
                            yield Err(Error::stream_error(format!("failed to parse Anthropic event: {}", e)));
                            break;
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    let body = response.text().await.unwrap_or_else(|_| "unable to read error body".to_string());
                    yield Err(Error::provider_error(format!("Anthropic API error {}: {}", status, body)));
                    break;
                }
                Err(e) => {
                    yield Err(Error::stream_error(format!("stream error: {}", e)));
                    break;
                }
            }
        }

        event_source.close();
    };

    Ok(GenerateStream::new(Box::pin(stream)))
}

fn process_event(
    event: AnthropicStreamEvent,
    blocks: &mut HashMap<u32, ActiveBlock>,
    input_tokens: &mut u32,
) -> Vec<StreamEvent> {
    let mut out = Vec::new();
    match event {
        AnthropicStreamEvent::MessageStart { .. } => {}
        AnthropicStreamEvent::ContentBlockStart { index, content_block } => match content_block {
            AnthropicStreamBlockStart::ToolUse { id, name } => {
                blocks.insert(index, ActiveBlock { id: id.clone(), name: name.clone() });
                out.push(StreamEvent::tool_call_start(id, name));
            }
            AnthropicStreamBlockStart::Text { text } => {
                if !text.is_empty() {
                    out.push(StreamEvent::text_delta(index.to_string(), text));
                }
            }
            AnthropicStreamBlockStart::Thinking { thinking } => {
                if !thinking.is_empty() {
                    out.push(StreamEvent::reasoning_delta(index.to_string(), thinking));
                }
            }
        },
        AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
            AnthropicStreamDelta::TextDelta { text } => out.push(StreamEvent::text_delta(index.to_string(), text)),
            AnthropicStreamDelta::ThinkingDelta { thinking } => out.push(StreamEvent::reasoning_delta(index.to_string(), thinking)),
            AnthropicStreamDelta::InputJsonDelta { partial_json } => {
                if let Some(block) = blocks.get(&index) {
                    out.push(StreamEvent::tool_call_delta(block.id.clone(), partial_json));
                }
            }
            AnthropicStreamDelta::Unknown => {}
        },
        AnthropicStreamEvent::ContentBlockStop { index } => {
            if let Some(block) = blocks.remove(&index) {
                if !block.name.is_empty() {
                    out.push(StreamEvent::tool_call_end(block.id, block.name, serde_json::json!({})));
                }
            }
        }
        AnthropicStreamEvent::MessageDelta { delta, usage } => {
            out.push(StreamEvent::finish(
                Usage::new(*input_tokens, usage.output_tokens),
                parse_stop_reason(&delta.stop_reason),
            ));
        }
        AnthropicStreamEvent::MessageStop | AnthropicStreamEvent::Ping | AnthropicStreamEvent::Unknown => {}
    }
    let _ = input_tokens;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::types::{AnthropicMessageDeltaInner, AnthropicStreamUsage};

    #[test]
    fn tool_use_block_start_then_stop_emits_start_and_end() {
        let mut blocks = HashMap::new();
        let mut input_tokens = 0;
        let start = AnthropicStreamEvent::ContentBlockStart {
            index: 0,
            content_block: AnthropicStreamBlockStart::ToolUse { id: "call_1".to_string(), name: "execute".to_string() },
        };
        let events = process_event(start, &mut blocks, &mut input_tokens);
        assert!(matches!(events[0], StreamEvent::ToolCallStart { .. }));

        let stop = AnthropicStreamEvent::ContentBlockStop { index: 0 };
        let events = process_event(stop, &mut blocks, &mut input_tokens);
        assert!(matches!(events[0], StreamEvent::ToolCallEnd { .. }));
    }

    #[test]
    fn input_json_delta_accumulates_against_active_block() {
        let mut blocks = HashMap::new();
        blocks.insert(0, ActiveBlock { id: "call_1".to_string(), name: "execute".to_string() });
        let mut input_tokens = 0;
        let delta = AnthropicStreamEvent::ContentBlockDelta {
            index: 0,
            delta: AnthropicStreamDelta::InputJsonDelta { partial_json: "{\"command\":".to_string() },
        };
        let events = process_event(delta, &mut blocks, &mut input_tokens);
        if let StreamEvent::ToolCallDelta { id, delta } = &events[0] {
            assert_eq!(id, "call_1");
            assert_eq!(delta, "{\"command\":");
        } else {
            panic!("expected ToolCallDelta");
        }
    }

    #[test]
    fn message_delta_emits_finish() {
        let mut blocks = HashMap::new();
        let mut input_tokens = 10;
        let event = AnthropicStreamEvent::MessageDelta {
            delta: AnthropicMessageDeltaInner { stop_reason: Some("end_turn".to_string()) },
            usage: AnthropicStreamUsage { output_tokens: 42 },
        };
        let events = process_event(event, &mut blocks, &mut input_tokens);
        if let StreamEvent::Finish { usage, .. } = &events[0] {
            assert_eq!(usage.completion_tokens, 42);
        } else {
            panic!("expected Finish");
        }
    }
}

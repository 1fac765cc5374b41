//! Z.AI streaming support: OpenAI-compatible SSE, `data: {"choices":[{"delta":{...}}]}`
//! chunks terminated by a literal `data: [DONE]`.

use std::collections::HashMap;

use futures::stream::StreamExt;
use reqwest_eventsource::{Event, EventSource};

use super::convert::parse_finish_reason;
use super::types::ZaiStreamChunk;
use crate::error::{Error, Result};
use crate::types::{GenerateStream, StreamEvent, Usage};

#[derive(Debug, Clone)]
struct AccumulatedToolCall {
    id: String,
    name: String,
    arguments: String,
}

pub async fn create_stream(mut event_source: EventSource) -> Result<GenerateStream> {
    let stream = async_stream::stream! {
        let mut tool_calls: HashMap<u32, AccumulatedToolCall> = HashMap::new();

        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => {
                    if message.data == "[DONE]" {
                        break;
                    }

                    match serde_json::from_str::<ZaiStreamChunk>(&message.data) {
                        Ok(chunk) => {
                            for stream_event in process_chunk(chunk, &mut tool_calls) {
                                yield Ok(stream_event);
                            }
                        }
                        Err(e) => {
                            yield Err(Error::stream_error(format!("failed to parse Z.AI chunk: {}", e)));
                            break;
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    let body = response.text().await.unwrap_or_else(|_| "unable to read error body".to_string());
                    yield Err(Error::provider_error(format!("Z.AI API error {}: {}", status, body)));
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

fn process_chunk(chunk: ZaiStreamChunk, tool_calls: &mut HashMap<u32, AccumulatedToolCall>) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    for choice in &chunk.choices {
        let delta = &choice.delta;

        if let Some(ref reasoning) = delta.reasoning_content {
            if !reasoning.is_empty() {
                events.push(StreamEvent::reasoning_delta("", reasoning.clone()));
            }
        }

        if let Some(ref content) = delta.content {
            if !content.is_empty() {
                events.push(StreamEvent::text_delta("", content.clone()));
            }
        }

        if let Some(ref delta_tool_calls) = delta.tool_calls {
            for tc in delta_tool_calls {
                let index = tc.index;

                if let Some(ref id) = tc.id {
                    let name = tc.function.name.clone().unwrap_or_default();
                    tool_calls.insert(index, AccumulatedToolCall { id: id.clone(), name: name.clone(), arguments: String::new() });
                    events.push(StreamEvent::tool_call_start(id.clone(), name));
                }

                if let Some(ref args) = tc.function.arguments {
                    if !args.is_empty() {
                        if let Some(accumulated) = tool_calls.get_mut(&index) {
                            accumulated.arguments.push_str(args);
                            events.push(StreamEvent::tool_call_delta(accumulated.id.clone(), args.clone()));
                        }
                    }
                }
            }
        }

        if choice.finish_reason.is_some() {
            for (_, tc) in tool_calls.drain() {
                let input_json =
                    if tc.arguments.is_empty() { serde_json::json!({}) } else { serde_json::from_str(&tc.arguments).unwrap_or(serde_json::json!({})) };
                events.push(StreamEvent::tool_call_end(tc.id, tc.name, input_json));
            }

            let usage = chunk.usage.as_ref().map(|u| Usage::new(u.prompt_tokens, u.completion_tokens)).unwrap_or_default();
            events.push(StreamEvent::finish(usage, parse_finish_reason(&choice.finish_reason)));
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::types::{ZaiDelta, ZaiStreamChoice, ZaiStreamFunction, ZaiStreamToolCall, ZaiUsage};

    fn chunk(delta: ZaiDelta, finish_reason: Option<&str>, usage: Option<ZaiUsage>) -> ZaiStreamChunk {
        ZaiStreamChunk { choices: vec![ZaiStreamChoice { delta, finish_reason: finish_reason.map(str::to_string) }], usage }
    }

    fn empty_delta() -> ZaiDelta {
        ZaiDelta { content: None, reasoning_content: None, tool_calls: None }
    }

    #[test]
    fn text_delta_emits_text_delta() {
        let mut tool_calls = HashMap::new();
        let c = chunk(ZaiDelta { content: Some("Hello".to_string()), ..empty_delta() }, None, None);
        let events = process_chunk(c, &mut tool_calls);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::TextDelta { delta, .. } if delta == "Hello"));
    }

    #[test]
    fn reasoning_delta_emits_reasoning_delta() {
        let mut tool_calls = HashMap::new();
        let c = chunk(ZaiDelta { reasoning_content: Some("thinking...".to_string()), ..empty_delta() }, None, None);
        let events = process_chunk(c, &mut tool_calls);
        assert!(matches!(&events[0], StreamEvent::ReasoningDelta { delta, .. } if delta == "thinking..."));
    }

    #[test]
    fn tool_call_start_accumulate_and_finish_emits_end_and_finish() {
        let mut tool_calls = HashMap::new();

        let start = chunk(
            ZaiDelta {
                tool_calls: Some(vec![ZaiStreamToolCall {
                    index: 0,
                    id: Some("call_1".to_string()),
                    function: ZaiStreamFunction { name: Some("get_weather".to_string()), arguments: Some(String::new()) },
                }]),
                ..empty_delta()
            },
            None,
            None,
        );
        let events = process_chunk(start, &mut tool_calls);
        assert!(matches!(&events[0], StreamEvent::ToolCallStart { id, name } if id == "call_1" && name == "get_weather"));

        let delta = chunk(
            ZaiDelta {
                tool_calls: Some(vec![ZaiStreamToolCall {
                    index: 0,
                    id: None,
                    function: ZaiStreamFunction { name: None, arguments: Some(r#"{"city":"Beijing"}"#.to_string()) },
                }]),
                ..empty_delta()
            },
            None,
            None,
        );
        let events = process_chunk(delta, &mut tool_calls);
        assert!(matches!(&events[0], StreamEvent::ToolCallDelta { id, delta } if id == "call_1" && delta == r#"{"city":"Beijing"}"#));

        let finish = chunk(
            empty_delta(),
            Some("tool_calls"),
            Some(ZaiUsage { prompt_tokens: 15, completion_tokens: 5, total_tokens: 20, prompt_tokens_details: None }),
        );
        let events = process_chunk(finish, &mut tool_calls);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::ToolCallEnd { id, name, arguments } if id == "call_1" && name == "get_weather" && arguments["city"] == "Beijing"));
        assert!(matches!(&events[1], StreamEvent::Finish { reason, .. } if reason.unified == crate::types::FinishReasonKind::ToolCalls));
        assert!(tool_calls.is_empty());
    }
}

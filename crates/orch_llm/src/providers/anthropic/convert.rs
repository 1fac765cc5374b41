//! Conversion between unified types and the Anthropic Messages API.

use serde_json::json;

use super::types::{
    AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicResponse, AnthropicThinking,
    AnthropicTool,
};
use crate::error::{Error, Result};
use crate::types::{
    ContentPart, FinishReason, FinishReasonKind, GenerateRequest, GenerateResponse, Message, ProviderOptions,
    ResponseContent, Role, ToolCall, Usage,
};

/// Converts a unified request into an Anthropic request, pulling any
/// `System` messages out into the top-level `system` field since Anthropic
/// has no system role inside `messages`.
pub fn to_anthropic_request(req: &GenerateRequest, stream: bool) -> Result<AnthropicRequest> {
    let system = req
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .filter_map(|m| m.text())
        .collect::<Vec<_>>();
    let system = if system.is_empty() { None } else { Some(system.join("\n\n")) };

    let messages: Vec<AnthropicMessage> = req
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(to_anthropic_message)
        .collect::<Result<Vec<_>>>()?;

    let tools = req.options.tools.as_ref().map(|tools| {
        tools
            .iter()
            .map(|tool| AnthropicTool {
                name: tool.function.name.clone(),
                description: tool.function.description.clone(),
                input_schema: tool.function.parameters.clone(),
            })
            .collect()
    });

    let tool_choice = req.options.tool_choice.as_ref().map(|choice| match choice {
        crate::types::ToolChoice::Auto => json!({"type": "auto"}),
        crate::types::ToolChoice::None => json!({"type": "none"}),
        crate::types::ToolChoice::Required { name } => json!({"type": "tool", "name": name}),
    });

    let thinking = req.provider_options.as_ref().and_then(|opts| {
        let ProviderOptions::Anthropic(anthropic) = opts;
        anthropic.thinking.as_ref().map(|t| AnthropicThinking {
            type_: "enabled".to_string(),
            budget_tokens: t.budget_tokens,
        })
    });

    Ok(AnthropicRequest {
        model: req.model.clone(),
        max_tokens: req.options.max_tokens.unwrap_or(4096),
        system,
        messages,
        temperature: req.options.temperature,
        top_p: req.options.top_p,
        stop_sequences: req.options.stop_sequences.clone(),
        tools,
        tool_choice,
        thinking,
        stream: if stream { Some(true) } else { None },
    })
}

fn to_anthropic_message(msg: &Message) -> Result<AnthropicMessage> {
    // Anthropic has no "tool" role: tool results ride along as content
    // blocks on a user-role message.
    let role = match msg.role {
        Role::User | Role::Tool => "user",
        Role::Assistant => "assistant",
        Role::System => unreachable!("system messages are filtered out before this point"),
    };

    let content = msg
        .parts()
        .iter()
        .map(|part| match part {
            ContentPart::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
            ContentPart::ToolCall { id, name, arguments } => AnthropicContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: arguments.clone(),
            },
            ContentPart::ToolResult { tool_call_id, content } => AnthropicContentBlock::ToolResult {
                tool_use_id: tool_call_id.clone(),
                content: content.clone(),
                is_error: None,
            },
        })
        .collect();

    Ok(AnthropicMessage {
        role: role.to_string(),
        content,
    })
}

pub fn from_anthropic_response(resp: AnthropicResponse) -> Result<GenerateResponse> {
    let mut content = Vec::new();
    for block in resp.content {
        match block {
            AnthropicContentBlock::Text { text } => content.push(ResponseContent::Text { text }),
            AnthropicContentBlock::Thinking { thinking } => content.push(ResponseContent::Reasoning { reasoning: thinking }),
            AnthropicContentBlock::ToolUse { id, name, input } => {
                content.push(ResponseContent::ToolCall(ToolCall { id, name, arguments: input }))
            }
            AnthropicContentBlock::ToolResult { .. } => {
                return Err(Error::invalid_response("tool_result block in assistant response"));
            }
        }
    }

    if content.is_empty() {
        return Err(Error::invalid_response("no content in Anthropic response"));
    }

    let usage = Usage {
        prompt_tokens: resp.usage.input_tokens,
        completion_tokens: resp.usage.output_tokens,
        total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
        input_token_details: Some(crate::types::InputTokenDetails {
            total: Some(resp.usage.input_tokens),
            no_cache: Some(resp.usage.input_tokens.saturating_sub(resp.usage.cache_read_input_tokens.unwrap_or(0))),
            cache_read: resp.usage.cache_read_input_tokens,
            cache_write: resp.usage.cache_creation_input_tokens,
        }),
        output_token_details: None,
        raw: Some(serde_json::to_value(&resp.usage).unwrap_or_default()),
    };

    Ok(GenerateResponse {
        content,
        usage,
        finish_reason: parse_stop_reason(&resp.stop_reason),
        metadata: Some(json!({"id": resp.id, "model": resp.model})),
        warnings: None,
    })
}

pub fn parse_stop_reason(reason: &Option<String>) -> FinishReason {
    match reason.as_deref() {
        Some("end_turn") => FinishReason::with_raw(FinishReasonKind::Stop, "end_turn"),
        Some("stop_sequence") => FinishReason::with_raw(FinishReasonKind::Stop, "stop_sequence"),
        Some("max_tokens") => FinishReason::with_raw(FinishReasonKind::Length, "max_tokens"),
        Some("tool_use") => FinishReason::with_raw(FinishReasonKind::ToolCalls, "tool_use"),
        Some(raw) => FinishReason::with_raw(FinishReasonKind::Other, raw),
        None => FinishReason::other(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GenerateOptions, Role};

    #[test]
    fn system_messages_are_pulled_into_top_level_field() {
        let req = GenerateRequest {
            model: "claude-opus-4".to_string(),
            messages: vec![
                Message::new(Role::System, "be terse"),
                Message::new(Role::User, "hi"),
            ],
            options: GenerateOptions::default(),
            provider_options: None,
            telemetry_metadata: None,
        };
        let anthropic_req = to_anthropic_request(&req, false).unwrap();
        assert_eq!(anthropic_req.system.as_deref(), Some("be terse"));
        assert_eq!(anthropic_req.messages.len(), 1);
        assert_eq!(anthropic_req.messages[0].role, "user");
    }

    #[test]
    fn tool_message_rides_as_user_role_tool_result_block() {
        let req = GenerateRequest {
            model: "claude-opus-4".to_string(),
            messages: vec![Message::new(Role::Tool, vec![ContentPart::tool_result("c1", json!({"ok": true}))])],
            options: GenerateOptions::default(),
            provider_options: None,
            telemetry_metadata: None,
        };
        let anthropic_req = to_anthropic_request(&req, false).unwrap();
        assert_eq!(anthropic_req.messages[0].role, "user");
        assert!(matches!(anthropic_req.messages[0].content[0], AnthropicContentBlock::ToolResult { .. }));
    }

    #[test]
    fn parse_stop_reason_maps_tool_use() {
        let reason = parse_stop_reason(&Some("tool_use".to_string()));
        assert_eq!(reason.unified, FinishReasonKind::ToolCalls);
    }

    #[test]
    fn parse_stop_reason_none_is_other() {
        assert_eq!(parse_stop_reason(&None).unified, FinishReasonKind::Other);
    }
}

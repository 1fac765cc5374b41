//! Conversation-to-LLM message conversion and request building.

use orch_core::{ContentBlock, Role, Session, Turn};
use orch_llm::types::{
    ContentPart, GenerateOptions, GenerateRequest, Message, Role as LlmRole, ToolChoice,
    ToolDefinition, ToolFunction,
};

use crate::tool_handler::ToolInfo;

use super::extract::extract_recent_files;

/// Builds the session-context blurb appended to the system prompt: which
/// session this is, how far the conversation has gone, and what files the
/// agent has touched recently.
pub fn build_session_context(session: &Session, messages: &[Turn]) -> String {
    let recent_files = extract_recent_files(messages);

    format!(
        r#"## Current Session
- Session ID: {}
- Slug: {}
- Claim: {}
- Turns so far: {}
- Files recently mentioned: {}
"#,
        session.id.as_str(),
        session.slug,
        session.claim_name,
        messages.len(),
        if recent_files.is_empty() {
            "none".to_string()
        } else {
            recent_files.join(", ")
        }
    )
}

/// Builds the messages array for an LLM request: a system message (prompt
/// plus session context) followed by every prior turn converted to a
/// provider-agnostic [`Message`].
pub fn build_messages(system_prompt: &str, session: &Session, messages: &[Turn]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len() + 1);

    let mut system_content = system_prompt.to_string();
    system_content.push_str("\n\n");
    system_content.push_str(&build_session_context(session, messages));
    out.push(Message::new(LlmRole::System, system_content));

    for turn in messages {
        if let Some(msg) = turn_to_message(turn) {
            out.push(msg);
        }
    }

    out
}

/// Builds a complete [`GenerateRequest`] ready to send to a provider.
pub fn build_generate_request(model: &str, messages: Vec<Message>, tools: &[ToolInfo], max_tokens: u32) -> GenerateRequest {
    let tool_defs: Vec<ToolDefinition> = tools
        .iter()
        .map(|t| ToolDefinition {
            function: ToolFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect();

    let options = GenerateOptions {
        temperature: Some(0.7),
        max_tokens: Some(max_tokens),
        tools: if tool_defs.is_empty() { None } else { Some(tool_defs) },
        tool_choice: if tools.is_empty() { None } else { Some(ToolChoice::Auto) },
        ..Default::default()
    };

    GenerateRequest {
        model: model.to_string(),
        messages,
        options,
        provider_options: None,
        telemetry_metadata: None,
    }
}

/// Converts one turn into an LLM message, preserving structured tool calls
/// and results. Returns `None` for turns with no content worth sending.
fn turn_to_message(turn: &Turn) -> Option<Message> {
    let role = match turn.role {
        Role::User => LlmRole::User,
        Role::Assistant => LlmRole::Assistant,
        Role::System => LlmRole::System,
        Role::Tool => LlmRole::Tool,
    };

    let mut parts: Vec<ContentPart> = Vec::new();

    for block in &turn.blocks {
        match block {
            ContentBlock::Text { text } => parts.push(ContentPart::text(text.clone())),
            ContentBlock::Thinking { thinking } => parts.push(ContentPart::text(format!("[Thinking] {thinking}"))),
            ContentBlock::Error { error } => parts.push(ContentPart::text(format!("[Error] {error}"))),
            ContentBlock::ToolUse { tool_use } => {
                parts.push(ContentPart::tool_call(tool_use.id.clone(), tool_use.name.clone(), tool_use.args.clone()));
            }
            ContentBlock::ToolResult { tool_result } => {
                let tool_use_id = tool_result
                    .output
                    .get("tool_use_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                parts.push(ContentPart::tool_result(tool_use_id, tool_result.output.clone()));
            }
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(Message::new(role, parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_core::SessionId;

    fn test_session() -> Session {
        Session::new(SessionId::new(), "user-sub", "user@example.com", "template-1", "my-project")
    }

    #[test]
    fn build_session_context_reports_turn_count() {
        let session = test_session();
        let messages = vec![Turn::user().with_block(ContentBlock::text("hi"))];
        let context = build_session_context(&session, &messages);
        assert!(context.contains("Turns so far: 1"));
        assert!(context.contains("my-project") || context.contains(&session.slug));
    }

    #[test]
    fn build_messages_empty_history_has_only_system() {
        let session = test_session();
        let messages = build_messages("You are a helpful assistant.", &session, &[]);
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0].role, LlmRole::System));
    }

    #[test]
    fn build_messages_with_turns() {
        let session = test_session();
        let turns = vec![
            Turn::user().with_block(ContentBlock::text("first message")),
            Turn::assistant().with_block(ContentBlock::text("first response")),
        ];
        let messages = build_messages("System prompt", &session, &turns);
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn turn_to_message_converts_text() {
        let turn = Turn::user().with_block(ContentBlock::text("Hello world"));
        let msg = turn_to_message(&turn).expect("should convert");
        assert!(matches!(msg.role, LlmRole::User));
        assert_eq!(msg.text(), Some("Hello world".to_string()));
    }

    #[test]
    fn turn_to_message_empty_turn_is_none() {
        let turn = Turn::user();
        assert!(turn_to_message(&turn).is_none());
    }
}

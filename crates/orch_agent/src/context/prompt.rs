//! System prompt construction and tool formatting.

use orch_sandbox::Policy;
use tracing::debug;

use super::instructions::{compose_instructions, DEFAULT_SOURCES};
use crate::tool_handler::ToolInfo;

const BASE_PROMPT: &str = r#"You are an autonomous coding agent working inside an ephemeral
sandbox checked out from the user's repository at /app.

## Role
You implement the user's request end to end: read the existing code, make
the edit, and verify it builds and passes tests before handing control back.

## Tools Available
{tools_desc}

## Safety Rules
- Destructive commands (rm/unlink/rmdir/shred, `git clean`, `find -delete`) and
  database drop/truncate calls pause for human approval before they run - expect
  to sometimes be rejected or edited.
- Never commit secrets to version control.
- Always verify file paths before editing; `edit_file` requires the old text to
  match exactly once.
- Keep `write_file` content under roughly 8000 characters per call; for larger
  files, write a skeleton first and grow it with `edit_file`.

## Behavior
- Be concise and direct.
- Make autonomous decisions when the request is clear.
- Ask for clarification only when truly ambiguous.
- Run the project's lint/build/test commands before declaring the task done.
"#;

/// Builds the system prompt: agent identity, tool descriptions, and the
/// safety rules the HITL middleware and QA engine enforce downstream, then
/// layers on any workspace-provided `AGENTS.md` instructions found in the
/// sandbox (`compose_instructions`).
pub async fn build_system_prompt(tools: &[ToolInfo], policy: &Policy, prompt_max_chars: usize, prompt_import_max_depth: u32) -> String {
    let base_prompt = render_base_prompt(tools);

    let composed = compose_instructions(policy, &base_prompt, DEFAULT_SOURCES, prompt_max_chars, prompt_import_max_depth).await;
    if !composed.missing_paths.is_empty() {
        debug!(missing = ?composed.missing_paths, "instruction compose missing paths");
    }

    composed.prompt
}

fn render_base_prompt(tools: &[ToolInfo]) -> String {
    BASE_PROMPT.replace("{tools_desc}", &format_tools(tools))
}

/// Formats tool descriptions for the system prompt.
pub(crate) fn format_tools(tools: &[ToolInfo]) -> String {
    if tools.is_empty() {
        return "No tools available.".to_string();
    }

    tools
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description.lines().next().unwrap_or("No description")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tools() -> Vec<ToolInfo> {
        vec![
            ToolInfo { name: "execute".to_string(), description: "Run a shell command".to_string(), parameters: serde_json::json!({}) },
            ToolInfo { name: "read_file".to_string(), description: "Read file contents".to_string(), parameters: serde_json::json!({}) },
        ]
    }

    #[test]
    fn base_prompt_lists_tools_and_safety_rules() {
        let prompt = render_base_prompt(&sample_tools());
        assert!(prompt.contains("execute"));
        assert!(prompt.contains("read_file"));
        assert!(prompt.contains("Safety Rules"));
    }

    #[test]
    fn format_tools_joins_name_and_description() {
        let formatted = format_tools(&sample_tools());
        assert!(formatted.contains("execute"));
        assert!(formatted.contains("Run a shell command"));
    }

    #[test]
    fn format_tools_empty_list() {
        let formatted = format_tools(&[]);
        assert!(formatted.contains("No tools available"));
    }
}

//! Tool execution: dispatches agent tool calls to the sandbox policy
//! wrapper, emits events, and builds the resulting tool-result turn.
//!
//! The `task` tool is handled in the runtime (it spawns a sub-agent); every
//! other tool call is handled here.

use std::time::Instant;

use orch_core::{ContentBlock, Role, SessionEvent, ToolResultData, ToolUse, Turn};
use orch_sandbox::Policy;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::error::{ControllerError, Result};

#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Fixed set of tools exposed to the model. `task` is described here too
/// (for the LLM's benefit) even though the runtime, not this module,
/// handles it.
pub fn available_tools() -> Vec<ToolInfo> {
    vec![
        ToolInfo {
            name: "execute".to_string(),
            description: "Run a shell command in the sandbox, rooted at /app.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "command": { "type": "string" } },
                "required": ["command"]
            }),
        },
        ToolInfo {
            name: "read_file".to_string(),
            description: "Read a file's contents from the sandbox.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"]
            }),
        },
        ToolInfo {
            name: "write_file".to_string(),
            description: "Create or overwrite a file in the sandbox with the given content.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "content": { "type": "string" }
                },
                "required": ["path", "content"]
            }),
        },
        ToolInfo {
            name: "edit_file".to_string(),
            description: "Replace one occurrence of old_string with new_string in an existing file.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "old_string": { "type": "string" },
                    "new_string": { "type": "string" }
                },
                "required": ["path", "old_string", "new_string"]
            }),
        },
        ToolInfo {
            name: "ls".to_string(),
            description: "List files under a directory in the sandbox.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"]
            }),
        },
        ToolInfo {
            name: "grep".to_string(),
            description: "Search file contents for a pattern.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string" },
                    "path": { "type": "string" },
                    "glob": { "type": "string" }
                },
                "required": ["pattern"]
            }),
        },
        ToolInfo {
            name: "glob".to_string(),
            description: "Find files matching a glob pattern.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string" },
                    "path": { "type": "string" }
                },
                "required": ["pattern"]
            }),
        },
        ToolInfo {
            name: "task".to_string(),
            description: "Run a sub-task in a separate agent. Use for independent, parallelizable work.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "prompt": { "type": "string", "description": "Full instructions for the sub-agent; it cannot see this conversation." },
                    "description": { "type": "string", "description": "Short label shown in the UI." }
                },
                "required": ["prompt", "description"]
            }),
        },
    ]
}

pub fn is_file_edit_tool(tool_name: &str) -> bool {
    matches!(tool_name, "write_file" | "edit_file")
}

fn tool_path(tool: &ToolUse) -> Option<&str> {
    tool.args.get("path").and_then(|v| v.as_str())
}

/// Executes one tool call against the sandbox policy wrapper, emitting
/// `ToolStart`/`ToolDone` around it.
pub async fn handle_tool_call(tool: ToolUse, policy: &Policy, event_tx: &mpsc::Sender<SessionEvent>) -> Result<ToolResultData> {
    info!("executing tool {} (id {})", tool.name, tool.id);
    let _ = event_tx.send(SessionEvent::tool_start(tool.clone())).await;

    let start = Instant::now();
    let result = dispatch(&tool, policy).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let tool_result = match result {
        Ok(output) => ToolResultData::success(output, duration_ms),
        Err(e) => {
            error!("tool {} failed: {}", tool.name, e);
            ToolResultData::error(json!({ "error": e.to_string() }), duration_ms)
        }
    };

    let _ = event_tx.send(SessionEvent::tool_done(tool.id.clone(), tool_result.clone())).await;
    Ok(tool_result)
}

async fn dispatch(tool: &ToolUse, policy: &Policy) -> Result<serde_json::Value> {
    match tool.name.as_str() {
        "execute" => {
            let cmd = tool
                .args
                .get("command")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ControllerError::ToolFailed { tool: "execute".to_string(), message: "missing 'command'".to_string() })?;
            match policy.execute_checked(cmd).await? {
                Ok(resp) => Ok(json!({ "stdout": resp.stdout, "stderr": resp.stderr, "exit_code": resp.exit_code })),
                Err(denied) => Ok(json!({ "exit_code": denied.exit_code, "output": denied.output })),
            }
        }
        "read_file" => {
            let path = tool_path(tool).ok_or_else(|| ControllerError::ToolFailed { tool: "read_file".to_string(), message: "missing 'path'".to_string() })?;
            let bytes = policy.read(path).await?;
            Ok(json!({ "content": String::from_utf8_lossy(&bytes) }))
        }
        "write_file" => {
            let path = tool_path(tool).ok_or_else(|| ControllerError::ToolFailed { tool: "write_file".to_string(), message: "missing 'path'".to_string() })?;
            let content = tool.args.get("content").and_then(|v| v.as_str()).unwrap_or("");
            let skipped = policy.upload_files(&[(path.to_string(), content.as_bytes().to_vec())]).await?;
            if skipped.iter().any(|p| p == path) {
                return Err(ControllerError::ToolFailed { tool: "write_file".to_string(), message: "permission_denied".to_string() });
            }
            Ok(json!({ "path": path, "bytes_written": content.len() }))
        }
        "edit_file" => {
            let path = tool_path(tool).ok_or_else(|| ControllerError::ToolFailed { tool: "edit_file".to_string(), message: "missing 'path'".to_string() })?;
            let old_string = tool.args.get("old_string").and_then(|v| v.as_str()).unwrap_or("");
            let new_string = tool.args.get("new_string").and_then(|v| v.as_str()).unwrap_or("");
            let bytes = policy.read(path).await?;
            let content = String::from_utf8_lossy(&bytes).into_owned();
            let occurrences = content.matches(old_string).count();
            if occurrences != 1 {
                return Err(ControllerError::ToolFailed {
                    tool: "edit_file".to_string(),
                    message: format!("old_string matched {occurrences} times, expected exactly 1"),
                });
            }
            let updated = content.replacen(old_string, new_string, 1);
            let skipped = policy.upload_files(&[(path.to_string(), updated.into_bytes())]).await?;
            if skipped.iter().any(|p| p == path) {
                return Err(ControllerError::ToolFailed { tool: "edit_file".to_string(), message: "permission_denied".to_string() });
            }
            Ok(json!({ "path": path }))
        }
        "ls" => {
            let dir = tool_path(tool).unwrap_or("/app");
            let entries = policy.manifest(dir, false).await?;
            Ok(json!({ "entries": entries.iter().map(|e| &e.path).collect::<Vec<_>>() }))
        }
        "grep" => {
            let pattern = tool.args.get("pattern").and_then(|v| v.as_str()).ok_or_else(|| ControllerError::ToolFailed { tool: "grep".to_string(), message: "missing 'pattern'".to_string() })?;
            let path = tool.args.get("path").and_then(|v| v.as_str());
            let glob = tool.args.get("glob").and_then(|v| v.as_str());
            let resp = policy.grep_raw(pattern, path, glob).await?;
            Ok(json!({ "stdout": resp.stdout, "exit_code": resp.exit_code }))
        }
        "glob" => {
            let pattern = tool.args.get("pattern").and_then(|v| v.as_str()).ok_or_else(|| ControllerError::ToolFailed { tool: "glob".to_string(), message: "missing 'pattern'".to_string() })?;
            let path = tool.args.get("path").and_then(|v| v.as_str()).unwrap_or("/app");
            let resp = policy.glob_info(pattern, path).await?;
            Ok(json!({ "stdout": resp.stdout, "exit_code": resp.exit_code }))
        }
        "db_drop_table" | "db_truncate_table" | "capture_preview_screenshot" => Err(ControllerError::ToolFailed {
            tool: tool.name.clone(),
            message: "not supported by this sandbox backend yet".to_string(),
        }),
        other => Err(ControllerError::ToolFailed { tool: other.to_string(), message: "unknown tool".to_string() }),
    }
}

/// Builds the `Tool` role turn carrying every result from one round of
/// tool execution.
pub fn create_tool_result_turn(results: &[(ToolUse, ToolResultData)]) -> Turn {
    let mut turn = Turn::new(Role::Tool);
    for (tool_use, result) in results {
        turn = turn.with_block(ContentBlock::tool_result(ToolResultData {
            output: json!({
                "tool_use_id": tool_use.id,
                "tool_name": tool_use.name,
                "result": result.output,
                "duration_ms": result.duration_ms,
                "is_error": result.is_error,
            }),
            duration_ms: result.duration_ms,
            is_error: result.is_error,
        }));
    }
    turn
}

/// Builds a synthetic error tool-result turn for calls the HITL middleware
/// rejected, so the agent observes the rejection and can adapt.
pub fn create_rejected_result_turn(rejected: &[(ToolUse, Option<String>)]) -> Turn {
    let mut turn = Turn::new(Role::Tool);
    for (tool_use, message) in rejected {
        let reason = message.clone().unwrap_or_else(|| "rejected by reviewer".to_string());
        turn = turn.with_block(ContentBlock::tool_result(ToolResultData {
            output: json!({
                "tool_use_id": tool_use.id,
                "tool_name": tool_use.name,
                "result": { "error": reason },
                "is_error": true,
            }),
            duration_ms: 0,
            is_error: true,
        }));
    }
    turn
}

pub fn extract_tool_calls(turn: &Turn) -> Vec<ToolUse> {
    turn.blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { tool_use } => Some(tool_use.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_file_edit_tool_matches_write_and_edit() {
        assert!(is_file_edit_tool("write_file"));
        assert!(is_file_edit_tool("edit_file"));
        assert!(!is_file_edit_tool("execute"));
        assert!(!is_file_edit_tool("read_file"));
    }

    #[test]
    fn extract_tool_calls_finds_tool_use_blocks() {
        let tool = ToolUse::new("t1", "execute", json!({"command": "ls"}));
        let turn = Turn::new(Role::Assistant)
            .with_block(ContentBlock::text("checking files"))
            .with_block(ContentBlock::tool_use(tool));
        let calls = extract_tool_calls(&turn);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "execute");
    }

    #[test]
    fn extract_tool_calls_empty_when_no_tool_use() {
        let turn = Turn::new(Role::Assistant).with_block(ContentBlock::text("no tools here"));
        assert!(extract_tool_calls(&turn).is_empty());
    }

    #[test]
    fn create_tool_result_turn_has_tool_role() {
        let tool = ToolUse::new("t1", "execute", json!({}));
        let result = ToolResultData::success(json!({"ok": true}), 5);
        let turn = create_tool_result_turn(&[(tool, result)]);
        assert_eq!(turn.role, Role::Tool);
        assert_eq!(turn.blocks.len(), 1);
    }

    #[test]
    fn available_tools_includes_task() {
        let tools = available_tools();
        assert!(tools.iter().any(|t| t.name == "task"));
    }
}

//! Controller State Machine (C4): drives one session through
//! `deepagents_edit -> qa_validate -> (pass|heal|fail) -> git_sync`,
//! checkpointing every node's output.
//!
//! This is a hand-written node graph rather than a generic graph library,
//! matching the runtime's preference for explicit control flow over a DSL.

use async_trait::async_trait;
use orch_core::{Checkpointer, ControllerState, Decision, FinalStatus, PendingHitl, Role, SessionEvent};
use orch_sandbox::Policy;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;
use crate::qa::{self, FailureClass, ProjectManifest};
use crate::runtime::{RunOutcome, Runtime};

/// One node of the controller graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControllerNode {
    DeepAgentsEdit,
    QaValidate,
    SelfHealMessage,
    QaFailSummary,
    GitSync,
    Done,
}

/// What `run_controller` returned.
#[derive(Debug)]
pub enum ControllerOutcome {
    Finished,
    Paused(PendingHitl),
}

/// A completed sync, reported back by [`GitSync::sync`].
pub struct GitSyncResult {
    pub commit_sha: Option<String>,
    pub pushed: bool,
}

/// Commit-message inputs assembled by `git_sync`, handed to a [`GitSync`]
/// implementation so it can produce a subject + body.
pub struct CommitMessage {
    pub user_request: String,
    pub last_answer: String,
    pub qa_passed: bool,
}

/// Abstraction over the Git Sync Engine (C8), kept local to the controller
/// until `orch-git` is wired in as a dependency. `NoGitSync` is used when
/// git sync is disabled or no implementation is configured.
#[async_trait]
pub trait GitSync: Send + Sync {
    async fn sync(&self, message: CommitMessage) -> std::result::Result<GitSyncResult, String>;
}

pub struct NoGitSync;

#[async_trait]
impl GitSync for NoGitSync {
    async fn sync(&self, _message: CommitMessage) -> std::result::Result<GitSyncResult, String> {
        Ok(GitSyncResult { commit_sha: None, pushed: false })
    }
}

/// Drives `state` through the controller graph from `DeepAgentsEdit` until
/// it reaches `Done` or pauses for HITL approval. Every node's output is
/// checkpointed under namespace `"controller"` before the next node runs.
pub async fn run_controller(
    agent: &mut Runtime,
    state: &mut ControllerState,
    checkpointer: &dyn Checkpointer,
    thread_id: &str,
    git: &dyn GitSync,
    cancel: Option<CancellationToken>,
) -> Result<ControllerOutcome> {
    drive(agent, state, checkpointer, thread_id, git, cancel, ControllerNode::DeepAgentsEdit).await
}

/// Resumes a previously paused run: applies the human's decisions to the
/// checkpointed tool calls, then re-enters the graph at `QaValidate` once
/// the resulting turn completes (or pauses again, or fails).
pub async fn resume_controller(
    agent: &mut Runtime,
    state: &mut ControllerState,
    decisions: Vec<Decision>,
    checkpointer: &dyn Checkpointer,
    thread_id: &str,
    git: &dyn GitSync,
    cancel: Option<CancellationToken>,
) -> Result<ControllerOutcome> {
    match agent.resume_after_hitl(state, decisions, cancel.clone()).await {
        Ok(RunOutcome::Done) => drive(agent, state, checkpointer, thread_id, git, cancel, ControllerNode::QaValidate).await,
        Ok(RunOutcome::Paused(pending)) => {
            checkpointer.put(thread_id, "controller", state)?;
            Ok(ControllerOutcome::Paused(pending))
        }
        Err(e) => {
            warn!("deep agent exception during resume, attempting git sync safety net: {e}");
            let _ = run_git_sync(agent, state, git).await;
            state.final_status = Some(FinalStatus::FailedQa);
            checkpointer.put(thread_id, "controller", state)?;
            Err(e)
        }
    }
}

/// Shared graph driver, entered either fresh (at `DeepAgentsEdit`) or
/// resumed (at `QaValidate`, after a resume's turn already completed).
async fn drive(
    agent: &mut Runtime,
    state: &mut ControllerState,
    checkpointer: &dyn Checkpointer,
    thread_id: &str,
    git: &dyn GitSync,
    cancel: Option<CancellationToken>,
    start_node: ControllerNode,
) -> Result<ControllerOutcome> {
    let mut node = start_node;

    loop {
        match node {
            ControllerNode::DeepAgentsEdit => {
                match agent.run_turn(state, cancel.clone()).await {
                    Ok(RunOutcome::Done) => node = ControllerNode::QaValidate,
                    Ok(RunOutcome::Paused(pending)) => {
                        checkpointer.put(thread_id, "controller", state)?;
                        return Ok(ControllerOutcome::Paused(pending));
                    }
                    Err(e) => {
                        warn!("deep agent exception, attempting git sync safety net: {e}");
                        let _ = run_git_sync(agent, state, git).await;
                        state.final_status = Some(FinalStatus::FailedQa);
                        checkpointer.put(thread_id, "controller", state)?;
                        return Err(e);
                    }
                }
            }
            ControllerNode::QaValidate => {
                node = run_qa_validate(agent, state).await?;
                checkpointer.put(thread_id, "controller", state)?;
            }
            ControllerNode::SelfHealMessage => {
                run_self_heal_message(state);
                checkpointer.put(thread_id, "controller", state)?;
                node = ControllerNode::DeepAgentsEdit;
            }
            ControllerNode::QaFailSummary => {
                run_qa_fail_summary(state);
                checkpointer.put(thread_id, "controller", state)?;
                node = ControllerNode::GitSync;
            }
            ControllerNode::GitSync => {
                run_git_sync(agent, state, git).await?;
                if state.final_status.is_none() {
                    state.final_status = Some(FinalStatus::Success);
                }
                checkpointer.put(thread_id, "controller", state)?;
                node = ControllerNode::Done;
            }
            ControllerNode::Done => {
                let _ = agent
                    .event_tx
                    .send(SessionEvent::session_end(orch_core::SessionStatus::Completed, state.final_status))
                    .await;
                return Ok(ControllerOutcome::Finished);
            }
        }
    }
}

async fn run_qa_validate(agent: &Runtime, state: &mut ControllerState) -> Result<ControllerNode> {
    if !agent.config.qa_enabled {
        state.qa_passed = true;
        return Ok(ControllerNode::GitSync);
    }

    let manifest = build_project_manifest(&agent.policy).await;
    let kind = qa::detect_project_kind(&manifest);
    let env_override = std::env::var("DEEPAGENTS_QA_COMMANDS").ok();
    let commands = qa::select_commands(kind, env_override.as_deref(), agent.config.run_tests);

    let outcome = qa::run_qa(&agent.policy, &commands, agent.config.qa_timeout, agent.config.qa_output_max_chars).await?;

    for result in &outcome.results {
        let _ = agent.event_tx.send(SessionEvent::qa_result(result.clone())).await;
    }
    state.qa_results.extend(outcome.results);
    state.qa_passed = outcome.passed;
    state.project_kind = Some(kind.tag().to_string());

    if outcome.passed {
        state.qa_environmental = false;
        return Ok(ControllerNode::GitSync);
    }

    state.qa_environmental = matches!(outcome.classification, Some(FailureClass::Environmental));
    let fixable = matches!(outcome.classification, Some(FailureClass::Fixable));
    if fixable && state.can_self_heal(agent.config.max_rounds) {
        Ok(ControllerNode::SelfHealMessage)
    } else {
        Ok(ControllerNode::QaFailSummary)
    }
}

/// Reads the handful of marker files the detector needs directly out of
/// the sandbox at `/app`.
async fn build_project_manifest(policy: &Policy) -> ProjectManifest {
    let entries = policy.manifest("/app", false).await.unwrap_or_default();
    let names: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();

    let has = |name: &str| names.iter().any(|p| p.trim_start_matches("/app/") == name);

    let pom_xml = if has("pom.xml") { policy.read("/app/pom.xml").await.ok().map(|b| String::from_utf8_lossy(&b).into_owned()) } else { None };
    let mix_exs = if has("mix.exs") { policy.read("/app/mix.exs").await.ok().map(|b| String::from_utf8_lossy(&b).into_owned()) } else { None };

    ProjectManifest {
        has_package_json: has("package.json"),
        has_pyproject_or_requirements: has("pyproject.toml") || has("requirements.txt"),
        has_pubspec_yaml: has("pubspec.yaml"),
        has_csproj_or_sln: names.iter().any(|p| p.ends_with(".csproj") || p.ends_with(".sln")),
        pom_xml,
        mix_exs,
    }
}

fn run_self_heal_message(state: &mut ControllerState) {
    let failure = state.last_qa_failure().cloned();
    let failure_summary = failure.as_ref().map(|f| f.output.chars().take(1000).collect::<String>()).unwrap_or_default();
    let command = failure.as_ref().map(|f| f.command.clone()).unwrap_or_default();
    let hint = qa::heal_hint_for_tag(state.project_kind.as_deref());

    let text = format!("The QA command `{command}` failed:\n\n```\n{failure_summary}\n```\n\nFix the underlying issue. If dependencies look missing, {hint}.");

    state.push_message(orch_core::Turn::user().with_block(orch_core::ContentBlock::text(text)));
    state.attempt += 1;
    info!("self-heal round {} queued", state.attempt);
}

fn run_qa_fail_summary(state: &mut ControllerState) {
    let failure = state.last_qa_failure().cloned();
    let detail = failure.map(|f| format!("`{}` exited {}", f.command, f.exit_code)).unwrap_or_else(|| "QA failed".to_string());

    let text = if state.qa_environmental {
        format!("QA could not run ({detail}). This looks like a sandbox environment/setup issue rather than something in the agent's edit, so self-heal was skipped — check the sandbox template's toolchain.")
    } else {
        format!("Gave up after {} round(s): {detail}.", state.attempt)
    };
    state.push_message(orch_core::Turn::new(Role::Assistant).with_block(orch_core::ContentBlock::text(text)));
    state.final_status = Some(FinalStatus::FailedQa);
}

async fn run_git_sync(agent: &Runtime, state: &mut ControllerState, git: &dyn GitSync) -> Result<()> {
    if !agent.config.git_sync_enabled {
        state.git_pushed = false;
        return Ok(());
    }

    let last_answer = state
        .messages
        .iter()
        .rev()
        .find(|t| t.role == Role::Assistant)
        .map(|t| t.blocks.iter().find_map(|b| if let orch_core::ContentBlock::Text { text } = b { Some(text.clone()) } else { None }).unwrap_or_default())
        .unwrap_or_default();

    let message = CommitMessage { user_request: agent.current_task(&state.messages), last_answer, qa_passed: state.qa_passed };

    match git.sync(message).await {
        Ok(result) => {
            state.git_pushed = result.pushed;
            state.git_last_commit = result.commit_sha.clone();
            if let Some(sha) = result.commit_sha {
                let _ = agent.event_tx.send(SessionEvent::git_synced(sha, result.pushed)).await;
            }
            Ok(())
        }
        Err(e) => {
            warn!("git sync failed: {e}");
            state.git_error = Some(e.clone());
            if agent.config.git_sync_required {
                Err(crate::error::ControllerError::GitSync(e))
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heal_hint_prefers_node_over_python() {
        let manifest = ProjectManifest {
            has_package_json: true,
            has_pyproject_or_requirements: true,
            has_pubspec_yaml: false,
            has_csproj_or_sln: false,
            pom_xml: None,
            mix_exs: None,
        };
        let kind = qa::detect_project_kind(&manifest);
        assert_eq!(qa::heal_hint_for_tag(Some(kind.tag())), "run `npm install`");
    }

    #[test]
    fn heal_hint_falls_back_when_unrecognized() {
        let manifest = ProjectManifest {
            has_package_json: false,
            has_pyproject_or_requirements: false,
            has_pubspec_yaml: false,
            has_csproj_or_sln: false,
            pom_xml: None,
            mix_exs: None,
        };
        let kind = qa::detect_project_kind(&manifest);
        assert_eq!(qa::heal_hint_for_tag(Some(kind.tag())), "install the project's dependencies");
    }

    #[test]
    fn heal_hint_for_tag_handles_missing_kind() {
        assert_eq!(qa::heal_hint_for_tag(None), "install the project's dependencies");
    }
}

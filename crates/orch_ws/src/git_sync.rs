//! Adapts the Git Sync Engine (C8) to the controller's [`GitSync`] seam,
//! binding it to one session's sandbox policy, project slug, and remote.

use std::sync::Arc;

use async_trait::async_trait;
use orch_agent::{CommitMessage, GitSync, GitSyncResult};
use orch_git::{GitSyncEngine, RemoteConfig};
use orch_sandbox::Policy;

pub struct SessionGitSync {
    engine: Arc<GitSyncEngine>,
    policy: Arc<Policy>,
    slug: String,
    remote: RemoteConfig,
}

impl SessionGitSync {
    pub fn new(engine: Arc<GitSyncEngine>, policy: Arc<Policy>, slug: String, remote: RemoteConfig) -> Self {
        Self { engine, policy, slug, remote }
    }
}

#[async_trait]
impl GitSync for SessionGitSync {
    async fn sync(&self, message: CommitMessage) -> Result<GitSyncResult, String> {
        let subject = if message.qa_passed { "Apply agent edit" } else { "Apply agent edit (QA failed)" };
        let commit_message = format!("{subject}\n\n{}\n\n---\n{}", message.user_request, message.last_answer);

        let outcome = self.engine.push(&self.policy, &self.slug, &self.remote, &commit_message).await.map_err(|e| e.to_string())?;

        Ok(GitSyncResult { commit_sha: outcome.commit_sha, pushed: outcome.pushed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_message_notes_qa_failure() {
        let subject = |qa_passed: bool| if qa_passed { "Apply agent edit" } else { "Apply agent edit (QA failed)" };
        assert_eq!(subject(true), "Apply agent edit");
        assert_eq!(subject(false), "Apply agent edit (QA failed)");
    }
}

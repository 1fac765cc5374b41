//! Git Sync Engine (C8): pushes a sandbox's current file tree to a remote
//! branch and pulls remote changes back with a baseline-aware three-way
//! merge. Operates against a local bare-ish clone cache directory per
//! project slug.

mod askpass;
pub mod error;
mod pull;
mod push;
mod repo;
pub mod types;

use std::path::PathBuf;

use orch_sandbox::Policy;

pub use error::{GitError, Result};
pub use types::{default_push_excludes, ConflictEntry, GitSyncState, PullOutcome, PushOutcome, RemoteConfig, STATE_PATH};

/// Owns the cache-directory root all sessions' clones live under.
pub struct GitSyncEngine {
    cache_root: PathBuf,
}

impl GitSyncEngine {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self { cache_root: cache_root.into() }
    }

    fn cache_dir(&self, slug: &str) -> PathBuf {
        self.cache_root.join(slug)
    }

    pub async fn push(&self, policy: &Policy, slug: &str, remote: &RemoteConfig, message: &str) -> Result<PushOutcome> {
        let outcome = push::push(policy, &self.cache_dir(slug), remote, message).await?;
        if let Some(sha) = &outcome.commit_sha {
            pull::record_baseline(policy, sha).await?;
        }
        Ok(outcome)
    }

    pub async fn pull(&self, policy: &Policy, slug: &str, remote: &RemoteConfig) -> Result<PullOutcome> {
        pull::pull(policy, &self.cache_dir(slug), remote).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_dir_is_scoped_by_slug() {
        let engine = GitSyncEngine::new("/tmp/orch-git-cache");
        assert_eq!(engine.cache_dir("proj-a"), PathBuf::from("/tmp/orch-git-cache/proj-a"));
        assert_eq!(engine.cache_dir("proj-b"), PathBuf::from("/tmp/orch-git-cache/proj-b"));
    }
}

//! Pull flow: remote -> three-way merge against the sandbox's current
//! content -> sandbox, with conflicting files shadowed rather than
//! overwritten.

use std::path::Path;

use orch_sandbox::Policy;

use crate::error::{GitError, Result};
use crate::repo;
use crate::types::{ConflictEntry, GitSyncState, PullOutcome, RemoteConfig, STATE_PATH};

pub async fn pull(policy: &Policy, cache_dir: &Path, remote: &RemoteConfig) -> Result<PullOutcome> {
    std::fs::create_dir_all(cache_dir)?;
    let repository = repo::open_or_init(cache_dir)?;
    repo::fetch(&repository, &remote.remote_url, &remote.branch, remote.token.as_deref())?;

    let remote_refname = format!("refs/remotes/origin/{}", remote.branch);
    let remote_oid = repository.refname_to_id(&remote_refname)?;
    let remote_sha = remote_oid.to_string();

    let state = read_state(policy).await;
    let Some(baseline_sha) = state.remote_head_sha else {
        return Err(GitError::NoBaseline { remote_sha });
    };

    if baseline_sha == remote_sha {
        return Ok(PullOutcome { remote_sha, updated_paths: Vec::new(), conflicts: Vec::new() });
    }

    let baseline_oid = git2::Oid::from_str(&baseline_sha)?;
    let baseline_tree = repository.find_commit(baseline_oid)?.tree()?;
    let remote_commit = repository.find_commit(remote_oid)?;
    let remote_tree = remote_commit.tree()?;
    let diff = repository.diff_tree_to_tree(Some(&baseline_tree), Some(&remote_tree), None)?;

    let mut changed_paths = Vec::new();
    diff.foreach(
        &mut |delta, _| {
            if let Some(p) = delta.new_file().path().and_then(|p| p.to_str()) {
                changed_paths.push(p.to_string());
            }
            true
        },
        None,
        None,
        None,
    )?;

    let mut updated_paths = Vec::new();
    let mut conflicts = Vec::new();

    for rel in changed_paths {
        let remote_bytes = remote_tree.get_path(Path::new(&rel)).ok().and_then(|e| repository.find_blob(e.id()).ok()).map(|b| b.content().to_vec());
        // TODO: remote-side deletions aren't applied to the sandbox yet; only modifications/adds are.
        let Some(remote_bytes) = remote_bytes else { continue };

        let baseline_bytes = baseline_tree.get_path(Path::new(&rel)).ok().and_then(|e| repository.find_blob(e.id()).ok()).map(|b| b.content().to_vec());
        let sandbox_path = format!("/app/{rel}");
        let sandbox_bytes = policy.read(&sandbox_path).await.ok();

        if sandbox_bytes == baseline_bytes {
            policy.upload_files(&[(sandbox_path.clone(), remote_bytes)]).await?;
            updated_paths.push(sandbox_path);
        } else {
            let shadow_path = format!("/.orchestrator/shadow/{rel}@{remote_sha}");
            policy.upload_files(&[(shadow_path.clone(), remote_bytes)]).await?;
            conflicts.push(ConflictEntry { path: sandbox_path, shadow_path });
        }
    }

    write_state(policy, &GitSyncState { remote_head_sha: Some(remote_sha.clone()) }).await?;

    Ok(PullOutcome { remote_sha, updated_paths, conflicts })
}

/// Records the given remote sha as the new baseline without touching any
/// sandbox file. Used after a push, so the next pull's three-way merge has
/// the right starting point.
pub async fn record_baseline(policy: &Policy, remote_sha: &str) -> Result<()> {
    write_state(policy, &GitSyncState { remote_head_sha: Some(remote_sha.to_string()) }).await
}

async fn read_state(policy: &Policy) -> GitSyncState {
    policy
        .read(STATE_PATH)
        .await
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

async fn write_state(policy: &Policy, state: &GitSyncState) -> Result<()> {
    let bytes = serde_json::to_vec(state)?;
    policy.upload_files(&[(STATE_PATH.to_string(), bytes)]).await?;
    Ok(())
}


//! Push flow: sandbox manifest -> local worktree -> commit -> remote.

use std::path::Path;

use orch_sandbox::types::EntryKind;
use orch_sandbox::Policy;

use crate::error::Result;
use crate::repo;
use crate::types::{default_push_excludes, PushOutcome, RemoteConfig};

const DOWNLOAD_CHUNK_SIZE: usize = 200;

pub async fn push(policy: &Policy, cache_dir: &Path, remote: &RemoteConfig, message: &str) -> Result<PushOutcome> {
    std::fs::create_dir_all(cache_dir)?;
    let repository = repo::open_or_init(cache_dir)?;
    repo::fetch(&repository, &remote.remote_url, &remote.branch, remote.token.as_deref())?;
    repo::checkout_or_orphan_branch(&repository, &remote.branch)?;
    repo::clear_worktree(cache_dir)?;

    let manifest = policy.manifest("/app", true).await?;
    let excludes = default_push_excludes();
    let entries: Vec<_> = manifest.into_iter().filter(|e| !is_excluded(&e.path, &excludes)).collect();

    write_entries(policy, cache_dir, &entries).await?;

    if repo::worktree_clean(&repository)? {
        return Ok(PushOutcome::default());
    }

    repo::stage_all(&repository)?;
    let stat = repo::diff_stat(&repository)?;
    let name_status = repo::diff_name_status(&repository)?;
    let commit_sha = repo::commit(&repository, message)?;
    repo::push_with_rebase_retry(&repository, &remote.remote_url, &remote.branch, remote.token.as_deref(), 3)?;

    Ok(PushOutcome { pushed: true, commit_sha: Some(commit_sha), stat: Some(stat), name_status: Some(name_status) })
}

fn sandbox_relative(path: &str) -> &str {
    path.trim_start_matches("/app/").trim_start_matches('/')
}

fn is_excluded(path: &str, excludes: &[String]) -> bool {
    let rel = sandbox_relative(path);
    excludes.iter().any(|p| rel.starts_with(p.as_str()))
}

async fn write_entries(policy: &Policy, cache_dir: &Path, entries: &[orch_sandbox::types::ManifestEntry]) -> Result<()> {
    let file_paths: Vec<String> = entries.iter().filter(|e| e.kind == EntryKind::File).map(|e| e.path.clone()).collect();

    for chunk in file_paths.chunks(DOWNLOAD_CHUNK_SIZE) {
        let fetched = policy.download_files(chunk).await?;
        for file in fetched {
            let Some(content) = file.content else { continue };
            let mode = entries.iter().find(|e| e.path == file.path).map(|e| e.mode);
            write_local_file(cache_dir, &file.path, &content, mode)?;
        }
    }

    for entry in entries.iter().filter(|e| e.kind == EntryKind::Symlink) {
        if let Some(target) = &entry.link_target {
            recreate_symlink(cache_dir, &entry.path, target)?;
        }
    }

    Ok(())
}

fn write_local_file(cache_dir: &Path, path: &str, content: &[u8], mode: Option<u32>) -> Result<()> {
    let target = cache_dir.join(sandbox_relative(path));
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, content)?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

#[cfg(unix)]
fn recreate_symlink(cache_dir: &Path, path: &str, target: &str) -> Result<()> {
    let link = cache_dir.join(sandbox_relative(path));
    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_file(&link);
    std::os::unix::fs::symlink(target, &link)?;
    Ok(())
}

#[cfg(not(unix))]
fn recreate_symlink(_cache_dir: &Path, _path: &str, _target: &str) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_excluded_matches_node_modules() {
        let excludes = default_push_excludes();
        assert!(is_excluded("/app/node_modules/left-pad/index.js", &excludes));
        assert!(is_excluded("/app/.env", &excludes));
        assert!(!is_excluded("/app/src/main.rs", &excludes));
    }
}

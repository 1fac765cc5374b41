//! Low-level `git2` plumbing shared by the push and pull flows: cache
//! directory management, fetch/push with injected credentials, worktree
//! staging, and diff summaries.

use std::path::Path;

use git2::{
    build::CheckoutBuilder, FetchOptions, IndexAddOption, ObjectType, PushOptions, Repository, Signature,
};

use crate::askpass::callbacks_with_token;
use crate::error::Result;

/// Opens the cache directory's repo, initializing a fresh one if it
/// doesn't exist yet.
pub fn open_or_init(dir: &Path) -> Result<Repository> {
    match Repository::open(dir) {
        Ok(repo) => Ok(repo),
        Err(_) => Ok(Repository::init(dir)?),
    }
}

pub fn fetch(repo: &Repository, remote_url: &str, branch: &str, token: Option<&str>) -> Result<()> {
    let mut remote = match repo.find_remote("origin") {
        Ok(r) => r,
        Err(_) => repo.remote("origin", remote_url)?,
    };
    let mut opts = FetchOptions::new();
    opts.remote_callbacks(callbacks_with_token(token));
    remote.fetch(&[branch], Some(&mut opts), None)?;
    Ok(())
}

/// Checks out `branch`, creating it as an orphan (no parent, empty tree) if
/// neither a local nor a fetched remote ref exists for it.
pub fn checkout_or_orphan_branch(repo: &Repository, branch: &str) -> Result<()> {
    let remote_ref = format!("refs/remotes/origin/{branch}");
    if let Ok(oid) = repo.refname_to_id(&remote_ref) {
        let commit = repo.find_commit(oid)?;
        repo.branch(branch, &commit, true)?;
        let refname = format!("refs/heads/{branch}");
        repo.set_head(&refname)?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        return Ok(());
    }

    let refname = format!("refs/heads/{branch}");
    if repo.refname_to_id(&refname).is_ok() {
        repo.set_head(&refname)?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        return Ok(());
    }

    // Orphan branch: an empty tree with no parent commit.
    let sig = sync_signature();
    let tree_oid = {
        let mut index = repo.index()?;
        index.write_tree()?
    };
    let tree = repo.find_tree(tree_oid)?;
    repo.commit(None, &sig, &sig, "initial commit", &tree, &[])?;
    let oid = repo.head()?.target().expect("just-created head has a target");
    let commit = repo.find_commit(oid)?;
    repo.branch(branch, &commit, true)?;
    repo.set_head(&refname)?;
    repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
    Ok(())
}

/// Removes every tracked-or-not file under `dir` except `.git`, so a push's
/// manifest walk starts from a known-empty worktree.
pub fn clear_worktree(dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

pub fn worktree_clean(repo: &Repository) -> Result<bool> {
    let statuses = repo.statuses(None)?;
    Ok(statuses.is_empty())
}

pub fn stage_all(repo: &Repository) -> Result<()> {
    let mut index = repo.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.write()?;
    Ok(())
}

/// `git diff --stat`-equivalent summary of the staged changes against HEAD.
pub fn diff_stat(repo: &Repository) -> Result<String> {
    let head_tree = head_tree(repo)?;
    let mut index = repo.index()?;
    let diff = repo.diff_tree_to_index(head_tree.as_ref(), Some(&index), None)?;
    index.write()?;
    let stats = diff.stats()?;
    let buf = stats.to_buf(git2::DiffStatsFormat::FULL, 80)?;
    Ok(buf.as_str().unwrap_or_default().to_string())
}

/// `git diff --name-status`-equivalent summary.
pub fn diff_name_status(repo: &Repository) -> Result<String> {
    let head_tree = head_tree(repo)?;
    let mut index = repo.index()?;
    let diff = repo.diff_tree_to_index(head_tree.as_ref(), Some(&index), None)?;
    index.write()?;
    let mut out = String::new();
    diff.foreach(
        &mut |delta, _| {
            let status = match delta.status() {
                git2::Delta::Added => "A",
                git2::Delta::Deleted => "D",
                git2::Delta::Modified => "M",
                git2::Delta::Renamed => "R",
                git2::Delta::Copied => "C",
                _ => "?",
            };
            let path = delta.new_file().path().or_else(|| delta.old_file().path()).and_then(|p| p.to_str()).unwrap_or("");
            out.push_str(&format!("{status}\t{path}\n"));
            true
        },
        None,
        None,
        None,
    )?;
    Ok(out)
}

fn head_tree(repo: &Repository) -> Result<Option<git2::Tree<'_>>> {
    match repo.head() {
        Ok(head) => {
            let obj = head.resolve()?.peel(ObjectType::Tree)?;
            Ok(Some(obj.peel_to_tree()?))
        }
        Err(_) => Ok(None),
    }
}

pub fn commit(repo: &Repository, message: &str) -> Result<String> {
    let sig = sync_signature();
    let mut index = repo.index()?;
    let tree_oid = index.write_tree()?;
    let tree = repo.find_tree(tree_oid)?;
    let parent = repo.head().ok().and_then(|h| h.target()).and_then(|oid| repo.find_commit(oid).ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
    Ok(oid.to_string())
}

/// Pushes `branch`, retrying up to `max_retries` times with a `pull --rebase`
/// equivalent (fetch + rebase onto the updated remote tip) on rejection.
pub fn push_with_rebase_retry(repo: &Repository, remote_url: &str, branch: &str, token: Option<&str>, max_retries: u32) -> Result<()> {
    let mut attempts = 0;
    loop {
        let mut remote = match repo.find_remote("origin") {
            Ok(r) => r,
            Err(_) => repo.remote("origin", remote_url)?,
        };
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");

        let mut push_err = None;
        let mut opts = PushOptions::new();
        {
            let mut cbs = callbacks_with_token(token);
            cbs.push_update_reference(|_refname, status| {
                if let Some(msg) = status {
                    push_err = Some(msg.to_string());
                }
                Ok(())
            });
            opts.remote_callbacks(cbs);
        }

        let result = remote.push(&[refspec.as_str()], Some(&mut opts));
        drop(opts);
        match (result, &push_err) {
            (Ok(()), None) => return Ok(()),
            _ if attempts >= max_retries => return Err(crate::error::GitError::PushRejected(max_retries)),
            _ => {
                attempts += 1;
                fetch(repo, remote_url, branch, token)?;
                rebase_onto_remote(repo, branch)?;
            }
        }
    }
}

fn rebase_onto_remote(repo: &Repository, branch: &str) -> Result<()> {
    let remote_ref = format!("refs/remotes/origin/{branch}");
    let upstream_oid = repo.refname_to_id(&remote_ref)?;
    let upstream_annotated = repo.find_annotated_commit(upstream_oid)?;
    let mut rebase = repo.rebase(None, None, Some(&upstream_annotated), None)?;
    let sig = sync_signature();
    while let Some(op) = rebase.next() {
        op?;
        rebase.commit(None, &sig, None)?;
    }
    rebase.finish(Some(&sig))?;
    Ok(())
}

fn sync_signature() -> Signature<'static> {
    Signature::now("orch-git", "orch-git@orchestrator.local").expect("static signature is always valid")
}

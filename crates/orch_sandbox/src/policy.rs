//! Policy Wrapper (C3): decorates a [`RuntimeClient`] with a path deny-list
//! and a compiled command deny-list, auditing every operation regardless of
//! outcome.

use std::sync::Arc;

use regex::RegexSet;

use crate::client::RuntimeClient;
use crate::error::{Result, SandboxError};
use crate::types::{ExecResponse, ManifestEntry};

/// One audited policy decision, handed to the caller-supplied audit
/// callback. Forms the raw material for the Tool Journal.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub operation: String,
    pub target: String,
    pub allowed: bool,
    pub detail: Option<String>,
}

pub type AuditFn = Arc<dyn Fn(AuditEntry) + Send + Sync>;

fn default_deny_paths() -> Vec<String> {
    vec!["/src/main.tsx".to_string()]
}

fn default_deny_prefixes() -> Vec<String> {
    vec![
        "/node_modules/".to_string(),
        "/.git/".to_string(),
        "/.env".to_string(),
        "/.venv/".to_string(),
    ]
}

/// Default destructive-command fragments, anchored so obfuscation via extra
/// whitespace or flag reordering still matches. Compiled once into a
/// [`RegexSet`] at construction.
fn default_deny_command_patterns() -> Vec<String> {
    vec![
        r"(^|[;&|(]|\s)rm\s+-rf\s+/(\s|$)".to_string(),
        r"(^|[;&|(]|\s)rm\s+-rf\s+/\*".to_string(),
        r"--no-preserve-root".to_string(),
        r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:".to_string(),
        r"(^|[;&|(]|\s)mkfs(\.\w+)?\s".to_string(),
        r"(^|[;&|(]|\s)dd\s+if=".to_string(),
        r">\s*/dev/sd[a-z]".to_string(),
    ]
}

pub struct PolicyConfig {
    pub deny_paths: Vec<String>,
    pub deny_prefixes: Vec<String>,
    pub deny_command_patterns: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            deny_paths: default_deny_paths(),
            deny_prefixes: default_deny_prefixes(),
            deny_command_patterns: default_deny_command_patterns(),
        }
    }
}

/// Decision returned by the command policy alone, without consulting the
/// runtime. Mirrors the shape a real exec would return so callers need no
/// special-case branch.
pub struct PolicyDeniedExec {
    pub output: String,
    pub exit_code: i32,
}

pub struct Policy {
    inner: RuntimeClient,
    deny_paths: Vec<String>,
    deny_prefixes: Vec<String>,
    deny_commands: RegexSet,
    audit: Option<AuditFn>,
}

impl Policy {
    pub fn new(inner: RuntimeClient, config: PolicyConfig) -> Self {
        let deny_commands = RegexSet::new(
            config
                .deny_command_patterns
                .iter()
                .map(|p| format!("(?i){p}")),
        )
        .expect("deny-command patterns must compile");
        Self {
            inner,
            deny_paths: config.deny_paths,
            deny_prefixes: config.deny_prefixes,
            deny_commands,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditFn) -> Self {
        self.audit = Some(audit);
        self
    }

    fn record(&self, operation: &str, target: &str, allowed: bool, detail: Option<String>) {
        if let Some(audit) = &self.audit {
            audit(AuditEntry {
                operation: operation.to_string(),
                target: target.to_string(),
                allowed,
                detail,
            });
        }
    }

    fn is_path_denied(&self, public_path: &str) -> bool {
        self.deny_paths.iter().any(|p| p == public_path)
            || self.deny_prefixes.iter().any(|pre| public_path.starts_with(pre.as_str()))
    }

    fn is_command_denied(&self, command: &str) -> bool {
        self.deny_commands.is_match(command)
    }

    /// Executes `cmd` through the wrapped client unless it matches a deny
    /// pattern, in which case it returns a synthetic `exit_code=126` result
    /// without the call ever reaching the sandbox.
    pub async fn execute(&self, cmd: &str) -> Result<ExecResponse> {
        if self.is_command_denied(cmd) {
            self.record("execute", cmd, false, Some("deny-command match".to_string()));
            return Ok(ExecResponse {
                stdout: format!("Policy denied command: {cmd}"),
                stderr: String::new(),
                exit_code: 126,
            });
        }
        self.record("execute", cmd, true, None);
        self.inner.execute(cmd).await
    }

    /// Same as [`Policy::execute`] but returns the denial as a distinct
    /// value instead of splicing `"Policy denied..."` into `stdout`, for
    /// callers (the QA engine, the tool dispatcher) that want to branch on
    /// it explicitly.
    pub async fn execute_checked(&self, cmd: &str) -> Result<std::result::Result<ExecResponse, PolicyDeniedExec>> {
        if self.is_command_denied(cmd) {
            self.record("execute", cmd, false, Some("deny-command match".to_string()));
            return Ok(Err(PolicyDeniedExec {
                output: format!("Policy denied command: {cmd}"),
                exit_code: 126,
            }));
        }
        self.record("execute", cmd, true, None);
        Ok(Ok(self.inner.execute(cmd).await?))
    }

    fn check_write(&self, public_path: &str) -> Result<()> {
        if self.is_path_denied(public_path) {
            self.record("write", public_path, false, Some("path deny-list".to_string()));
            return Err(SandboxError::PermissionDenied(public_path.to_string()));
        }
        self.record("write", public_path, true, None);
        Ok(())
    }

    pub async fn upload_files(&self, files: &[(String, Vec<u8>)]) -> Result<Vec<String>> {
        let mut skipped = Vec::new();
        let mut allowed = Vec::new();
        for (path, bytes) in files {
            match self.check_write(path) {
                Ok(()) => allowed.push((path.clone(), bytes.clone())),
                Err(_) => skipped.push(path.clone()),
            }
        }
        if !allowed.is_empty() {
            self.inner.upload_files(&allowed).await?;
        }
        Ok(skipped)
    }

    pub async fn manifest(&self, dir: &str, include_hidden: bool) -> Result<Vec<ManifestEntry>> {
        self.record("manifest", dir, true, None);
        self.inner.manifest(dir, include_hidden).await
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.record("read", path, true, None);
        self.inner.read(path).await
    }

    pub async fn download_files(&self, paths: &[String]) -> Result<Vec<crate::types::FetchedFile>> {
        self.record("download_files", &paths.join(","), true, None);
        self.inner.download_files(paths).await
    }

    pub async fn ls_info(&self, dir: &str) -> Result<Vec<String>> {
        self.record("ls", dir, true, None);
        self.inner.ls_info(dir).await
    }

    pub async fn grep_raw(&self, pattern: &str, path: Option<&str>, glob: Option<&str>) -> Result<ExecResponse> {
        self.record("grep", pattern, true, None);
        self.inner.grep_raw(pattern, path, glob).await
    }

    pub async fn glob_info(&self, pattern: &str, path: &str) -> Result<ExecResponse> {
        self.record("glob", pattern, true, None);
        self.inner.glob_info(pattern, path).await
    }

    pub fn inner(&self) -> &RuntimeClient {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RuntimeClientHandle;

    fn policy() -> Policy {
        let handle = RuntimeClientHandle::new("claim-abc", "http://claim-abc.ns.svc:8080");
        Policy::new(RuntimeClient::new(handle), PolicyConfig::default())
    }

    #[test]
    fn denies_exact_path_and_prefix() {
        let p = policy();
        assert!(p.is_path_denied("/src/main.tsx"));
        assert!(p.is_path_denied("/node_modules/foo/index.js"));
        assert!(p.is_path_denied("/.git/HEAD"));
        assert!(!p.is_path_denied("/src/other.tsx"));
    }

    #[test]
    fn denies_destructive_commands_with_obfuscation() {
        let p = policy();
        assert!(p.is_command_denied("rm -rf /"));
        assert!(p.is_command_denied("RM   -RF   /"));
        assert!(p.is_command_denied("sudo rm --no-preserve-root -rf /"));
        assert!(p.is_command_denied(":(){ :|:& };:"));
        assert!(p.is_command_denied("dd if=/dev/zero of=/dev/sda"));
        assert!(!p.is_command_denied("rm -rf ./build"));
        assert!(!p.is_command_denied("npm run build"));
    }
}

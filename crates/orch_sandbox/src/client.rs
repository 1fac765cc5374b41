//! Typed client over the sandbox runtime HTTP API running inside each sandbox pod.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, StatusCode};
use tokio::time::timeout;

use crate::error::{Result, SandboxError};
use crate::types::*;

const DOWNLOAD_CHUNK_SIZE: usize = 200;

/// Immutable handle owned by the session manager and shared by every tool
/// invocation for a session: claim name, base URL, sandbox root, timeouts.
#[derive(Debug, Clone)]
pub struct RuntimeClientHandle {
    pub claim_name: String,
    pub base_url: String,
    pub root_dir: String,
    pub request_timeout: Duration,
    pub exec_timeout: Duration,
}

impl RuntimeClientHandle {
    pub fn new(claim_name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            claim_name: claim_name.into(),
            base_url: base_url.into(),
            root_dir: "/app".to_string(),
            request_timeout: Duration::from_secs(30),
            exec_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_exec_timeout(mut self, d: Duration) -> Self {
        self.exec_timeout = d;
        self
    }

    pub fn with_request_timeout(mut self, d: Duration) -> Self {
        self.request_timeout = d;
        self
    }
}

/// Maps a public path (rooted at `/`) to the internal path under `root_dir`,
/// rejecting any traversal that would escape the sandbox root.
pub fn path_to_internal(root_dir: &str, public_path: &str) -> Result<String> {
    let normalized = normalize_public_path(public_path);
    if normalized.split('/').any(|seg| seg == "..") {
        return Err(SandboxError::PathEscapesRoot(public_path.to_string()));
    }
    let trimmed = normalized.trim_start_matches('/');
    let joined = if trimmed.is_empty() {
        root_dir.to_string()
    } else {
        format!("{}/{}", root_dir.trim_end_matches('/'), trimmed)
    };
    if !joined.starts_with(root_dir) {
        return Err(SandboxError::PathEscapesRoot(public_path.to_string()));
    }
    Ok(joined)
}

/// Collapses `.` segments and repeated slashes without resolving `..`
/// (callers reject `..` explicitly so its presence is always an error, never
/// silently absorbed).
fn normalize_public_path(p: &str) -> String {
    let mut out = Vec::new();
    for seg in p.split('/') {
        match seg {
            "" | "." => continue,
            other => out.push(other),
        }
    }
    format!("/{}", out.join("/"))
}

/// Thin typed client over the sandbox runtime HTTP API (C2). Carries no
/// policy of its own; `orch_sandbox::policy::Policy` wraps it to add deny
/// rules and auditing before any call reaches here.
pub struct RuntimeClient {
    http: Client,
    handle: RuntimeClientHandle,
}

impl RuntimeClient {
    pub fn new(handle: RuntimeClientHandle) -> Self {
        let http = Client::builder()
            .timeout(handle.request_timeout)
            .build()
            .expect("reqwest client build");
        Self { http, handle }
    }

    pub fn handle(&self) -> &RuntimeClientHandle {
        &self.handle
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.handle.base_url.trim_end_matches('/'), path)
    }

    pub fn internal_path(&self, public_path: &str) -> Result<String> {
        path_to_internal(&self.handle.root_dir, public_path)
    }

    /// A relative path (no leading slash) suitable for query params like
    /// `?dir=`, derived from the validated internal path.
    fn relative(&self, public_path: &str) -> Result<String> {
        let internal = self.internal_path(public_path)?;
        Ok(internal
            .strip_prefix(&self.handle.root_dir)
            .unwrap_or(&internal)
            .trim_start_matches('/')
            .to_string())
    }

    pub async fn health(&self) -> Result<bool> {
        let resp = self.http.get(self.url("/healthz")).send().await?;
        Ok(resp.status().is_success())
    }

    pub async fn ready(&self) -> Result<bool> {
        let resp = self.http.get(self.url("/readyz")).send().await?;
        Ok(resp.status() == StatusCode::OK)
    }

    /// Wraps `cmd` in `sh -lc` because the runtime executes argv, not a
    /// shell line. Bounded by `exec_timeout`.
    pub async fn execute(&self, cmd: &str) -> Result<ExecResponse> {
        let wrapped = format!("sh -lc {}", shell_quote(cmd));
        let fut = self
            .http
            .post(self.url("/exec"))
            .json(&ExecRequest { command: wrapped })
            .send();
        let resp = timeout(self.handle.exec_timeout, fut)
            .await
            .map_err(|_| SandboxError::Timeout(self.handle.exec_timeout.as_secs()))??;
        check_status(&resp)?;
        Ok(resp.json::<ExecResponse>().await?)
    }

    pub async fn manifest(&self, dir: &str, include_hidden: bool) -> Result<Vec<ManifestEntry>> {
        let rel = self.relative(dir)?;
        let resp = self
            .http
            .get(self.url("/manifest"))
            .query(&[
                ("dir", rel.as_str()),
                ("include_hidden", if include_hidden { "1" } else { "0" }),
            ])
            .send()
            .await?;
        check_status(&resp)?;
        let body: ManifestResponse = resp.json().await?;
        Ok(body
            .entries
            .into_iter()
            .filter(|e| !e.path.starts_with(".git/") && !e.path.contains("/node_modules/"))
            .collect())
    }

    pub async fn ls_info(&self, dir: &str) -> Result<Vec<String>> {
        let rel = self.relative(dir)?;
        let resp = self
            .http
            .get(self.url("/list"))
            .query(&[("dir", rel.as_str())])
            .send()
            .await?;
        check_status(&resp)?;
        Ok(resp.json::<ListResponse>().await?.files)
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let rel = self.relative(path)?;
        let resp = self.http.get(self.url(&format!("/download/{rel}"))).send().await?;
        check_status(&resp)?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Batched download, falling back to per-file GET only on 404/405 from
    /// the batch endpoint — not on timeouts, which propagate.
    pub async fn download_files(&self, paths: &[String]) -> Result<Vec<FetchedFile>> {
        let mut out = Vec::with_capacity(paths.len());
        for chunk in paths.chunks(DOWNLOAD_CHUNK_SIZE) {
            let rels: Vec<String> = chunk
                .iter()
                .map(|p| self.relative(p))
                .collect::<Result<_>>()?;
            let resp = self
                .http
                .post(self.url("/download_many"))
                .json(&DownloadManyRequest { paths: rels })
                .send()
                .await?;
            match resp.status() {
                StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => {
                    for p in chunk {
                        out.push(self.download_one(p).await);
                    }
                }
                status if status.is_success() => {
                    let body: DownloadManyResponse = resp.json().await?;
                    for f in body.files {
                        let content = match &f.content_b64 {
                            Some(b64) => Some(
                                BASE64
                                    .decode(b64)
                                    .map_err(|e| SandboxError::Base64(e.to_string()))?,
                            ),
                            None => None,
                        };
                        out.push(FetchedFile {
                            path: f.path,
                            content,
                            error: f.error,
                        });
                    }
                }
                status => {
                    return Err(SandboxError::RuntimeStatus {
                        status: status.as_u16(),
                        body: resp.text().await.unwrap_or_default(),
                    });
                }
            }
        }
        Ok(out)
    }

    async fn download_one(&self, public_path: &str) -> FetchedFile {
        match self.read(public_path).await {
            Ok(bytes) => FetchedFile {
                path: public_path.to_string(),
                content: Some(bytes),
                error: None,
            },
            Err(e) => FetchedFile {
                path: public_path.to_string(),
                content: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub async fn upload_files(&self, files: &[(String, Vec<u8>)]) -> Result<()> {
        for (public_path, bytes) in files {
            let rel = self.relative(public_path)?;
            if let Some(parent) = rel.rsplit_once('/').map(|(p, _)| p) {
                let _ = self.execute(&format!("mkdir -p {}", shell_quote(parent))).await;
            }
            let resp = self
                .http
                .post(self.url("/write_b64"))
                .json(&WriteB64Request {
                    path: rel,
                    content_b64: BASE64.encode(bytes),
                })
                .send()
                .await?;
            check_status(&resp)?;
        }
        Ok(())
    }

    pub async fn grep_raw(&self, pattern: &str, path: Option<&str>, glob: Option<&str>) -> Result<ExecResponse> {
        let rel = match path {
            Some(p) => self.relative(p)?,
            None => String::new(),
        };
        let mut cmd = format!("grep -rn {}", shell_quote(pattern));
        if let Some(g) = glob {
            cmd.push_str(&format!(" --include={}", shell_quote(g)));
        }
        if !rel.is_empty() {
            cmd.push(' ');
            cmd.push_str(&shell_quote(&rel));
        } else {
            cmd.push_str(" .");
        }
        self.execute(&cmd).await
    }

    pub async fn glob_info(&self, pattern: &str, path: &str) -> Result<ExecResponse> {
        let rel = self.relative(path)?;
        let cmd = format!(
            "cd {} && find . -path {}",
            shell_quote(if rel.is_empty() { "." } else { &rel }),
            shell_quote(&format!("./{pattern}"))
        );
        self.execute(&cmd).await
    }
}

fn check_status(resp: &reqwest::Response) -> Result<()> {
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(SandboxError::RuntimeStatus {
            status: resp.status().as_u16(),
            body: String::new(),
        })
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_dotdot_traversal() {
        assert!(path_to_internal("/app", "/../etc/passwd").is_err());
        assert!(path_to_internal("/app", "/a/../../etc/passwd").is_err());
    }

    #[test]
    fn accepts_normal_paths() {
        assert_eq!(path_to_internal("/app", "/src/main.rs").unwrap(), "/app/src/main.rs");
        assert_eq!(path_to_internal("/app", "/").unwrap(), "/app");
        assert_eq!(path_to_internal("/app", "src/main.rs").unwrap(), "/app/src/main.rs");
    }

    #[test]
    fn collapses_dot_segments() {
        assert_eq!(
            path_to_internal("/app", "/src/./util/../util/lib.rs").is_err(),
            true,
            "a `..` anywhere is rejected even when it would resolve back inside root"
        );
    }
}

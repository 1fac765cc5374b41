//! Session Manager (C1): owns the `SandboxClaim -> Sandbox` lifecycle for
//! every active session and lazily builds the policy-wrapped runtime client
//! each tool call goes through.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kube::api::{Api, DeleteParams, PostParams, PropagationPolicy};
use orch_core::SessionId;
use orch_sandbox::{Policy, PolicyConfig, RuntimeClient, RuntimeClientHandle};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::crds::{is_ready, SandboxClaim, SandboxClaimSpec, SandboxTemplateRef};
use crate::error::{K8sError, Result};

/// Environment handed back to the agent runtime once a session's sandbox is
/// ready: where to reach it and how the client should present it.
#[derive(Debug, Clone)]
pub struct SessionEnv {
    pub claim_name: String,
    pub preview_url: String,
    pub runtime_base_url: String,
    /// `true` when `ensure_session` found an existing claim rather than
    /// creating a new one (reconnect case).
    pub reconnected: bool,
}

struct SessionEntry {
    env: Option<SessionEnv>,
    policy: Option<Arc<Policy>>,
}

impl SessionEntry {
    fn empty() -> Self {
        Self { env: None, policy: None }
    }
}

#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    pub namespace: String,
    pub template_name: String,
    pub claim_prefix: String,
    pub ready_timeout: Duration,
    pub preview_scheme: String,
    pub preview_base_domain: String,
    pub backend_probe_attempts: u32,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            template_name: "default".to_string(),
            claim_prefix: "sbx".to_string(),
            ready_timeout: Duration::from_secs(180),
            preview_scheme: "https".to_string(),
            preview_base_domain: "preview.example.internal".to_string(),
            backend_probe_attempts: 5,
        }
    }
}

/// Each session gets one entry behind its own lock, so two concurrent
/// requests for the same session serialize instead of racing to create two
/// claims; unrelated sessions never block each other.
pub struct SessionManager {
    client: kube::Client,
    config: SessionManagerConfig,
    sessions: Mutex<HashMap<String, Arc<Mutex<SessionEntry>>>>,
}

impl SessionManager {
    pub fn new(client: kube::Client, config: SessionManagerConfig) -> Self {
        Self { client, config, sessions: Mutex::new(HashMap::new()) }
    }

    async fn entry_for(&self, session_id: &str) -> Arc<Mutex<SessionEntry>> {
        let mut sessions = self.sessions.lock().await;
        sessions.entry(session_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(SessionEntry::empty()))).clone()
    }

    /// Creates (or reconnects to) the session's sandbox claim and waits for
    /// it to report Ready. Idempotent: a second call for the same session
    /// while the first is still establishing the claim blocks on the same
    /// lock rather than submitting a duplicate claim.
    pub async fn ensure_session(&self, session_id: &SessionId, slug: Option<&str>) -> Result<SessionEnv> {
        let entry_lock = self.entry_for(session_id.as_str()).await;
        let mut entry = entry_lock.lock().await;

        if let Some(env) = &entry.env {
            return Ok(env.clone());
        }

        let claim_name = session_id.claim_name(&self.config.claim_prefix);
        let claims: Api<SandboxClaim> = Api::namespaced(self.client.clone(), &self.config.namespace);

        let existing = claims.get_opt(&claim_name).await?;
        let reconnected = existing.is_some();
        if existing.is_none() {
            info!(claim = %claim_name, "creating sandbox claim");
            let claim = SandboxClaim::new(
                &claim_name,
                SandboxClaimSpec { sandbox_template_ref: SandboxTemplateRef { name: self.config.template_name.clone() } },
            );
            claims.create(&PostParams::default(), &claim).await?;
        } else {
            info!(claim = %claim_name, "reconnecting to existing sandbox claim");
        }

        let sandboxes: Api<crate::crds::Sandbox> = Api::namespaced(self.client.clone(), &self.config.namespace);
        let status = wait_for_ready(&sandboxes, &claim_name, self.config.ready_timeout).await?;

        let preview_host = slug.unwrap_or(&claim_name);
        let preview_url = format!("{}://{}.{}/", self.config.preview_scheme, preview_host, self.config.preview_base_domain);
        let runtime_base_url = status
            .runtime_base_url
            .unwrap_or_else(|| format!("http://{claim_name}.{}.svc.cluster.local:8080", self.config.namespace));

        let env = SessionEnv { claim_name, preview_url, runtime_base_url, reconnected };
        entry.env = Some(env.clone());
        Ok(env)
    }

    /// Lazily builds the policy-wrapped runtime client for a session whose
    /// environment is already established, probing it with a cheap `true`
    /// exec before handing it back so a cold sandbox never surfaces as a
    /// confusing mid-tool-call failure.
    pub async fn get_backend(&self, session_id: &str) -> Result<Arc<Policy>> {
        let entry_lock = self.entry_for(session_id).await;
        let mut entry = entry_lock.lock().await;

        if let Some(policy) = &entry.policy {
            return Ok(policy.clone());
        }

        let env = entry.env.clone().ok_or_else(|| K8sError::NoEnv(session_id.to_string()))?;
        let handle = RuntimeClientHandle::new(env.claim_name.clone(), env.runtime_base_url.clone());
        let client = RuntimeClient::new(handle);
        let policy = Policy::new(client, PolicyConfig::default());

        probe_backend(&policy, self.config.backend_probe_attempts).await?;

        let policy = Arc::new(policy);
        entry.policy = Some(policy.clone());
        Ok(policy)
    }

    /// Deletes the session's sandbox claim with foreground propagation,
    /// treating a 404 as success, and drops the cached entry either way.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let claim_name = {
            let entry_lock = self.entry_for(session_id).await;
            let entry = entry_lock.lock().await;
            entry.env.as_ref().map(|e| e.claim_name.clone())
        };

        if let Some(claim_name) = claim_name {
            let claims: Api<SandboxClaim> = Api::namespaced(self.client.clone(), &self.config.namespace);
            let params = DeleteParams { propagation_policy: Some(PropagationPolicy::Foreground), ..Default::default() };
            match claims.delete(&claim_name, &params).await {
                Ok(_) => {}
                Err(kube::Error::Api(e)) if e.code == 404 => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.sessions.lock().await.remove(session_id);
        Ok(())
    }
}

async fn wait_for_ready(api: &Api<crate::crds::Sandbox>, name: &str, timeout: Duration) -> Result<crate::crds::SandboxStatus> {
    let start = Instant::now();
    loop {
        if let Some(sandbox) = api.get_opt(name).await? {
            if let Some(status) = &sandbox.status {
                if is_ready(status) {
                    return Ok(status.clone());
                }
            }
        }

        if start.elapsed() >= timeout {
            return Err(K8sError::SandboxNotReady(timeout.as_secs()));
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

async fn probe_backend(policy: &Policy, attempts: u32) -> Result<()> {
    let mut last_err = None;
    for attempt in 0..attempts.max(1) {
        match policy.execute("true").await {
            Ok(_) => return Ok(()),
            Err(e) => {
                warn!(attempt, "sandbox backend probe failed: {e}");
                last_err = Some(e);
                tokio::time::sleep(Duration::from_millis(200 * 2u64.pow(attempt.min(4)))).await;
            }
        }
    }
    Err(last_err.map(K8sError::Backend).unwrap_or(K8sError::NoEnv("probe exhausted with no error recorded".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_timeouts() {
        let config = SessionManagerConfig::default();
        assert_eq!(config.ready_timeout, Duration::from_secs(180));
        assert_eq!(config.backend_probe_attempts, 5);
    }
}

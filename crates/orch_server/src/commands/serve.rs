//! `orch-server serve`: wires the Kubernetes session manager, checkpointer,
//! Git sync engine, and agent runtime config into the WebSocket app, then
//! binds the HTTP listener.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use orch_agent::RuntimeConfig;
use orch_core::{Checkpointer, InMemoryCheckpointer, SqliteCheckpointer};
use orch_git::GitSyncEngine;
use orch_k8s::{SessionManager, SessionManagerConfig};
use orch_ws::{AppState, GitSyncSettings};
use tracing::info;

use crate::output;

pub async fn handle(listen: String, namespace: String, template_name: String, checkpoint_db: Option<String>, git_cache_dir: String) -> Result<()> {
    let client = kube::Client::try_default().await.context("connecting to the Kubernetes API")?;

    let k8s_config = SessionManagerConfig {
        namespace,
        template_name,
        ready_timeout: Duration::from_secs(env_u64("ORCH_SANDBOX_READY_TIMEOUT_S", 180)),
        preview_scheme: std::env::var("ORCH_PREVIEW_SCHEME").unwrap_or_else(|_| "https".to_string()),
        preview_base_domain: std::env::var("ORCH_PREVIEW_BASE_DOMAIN").unwrap_or_else(|_| "preview.example.internal".to_string()),
        ..SessionManagerConfig::default()
    };
    let k8s = Arc::new(SessionManager::new(client, k8s_config));

    let checkpointer: Arc<dyn Checkpointer> = match checkpoint_db {
        Some(path) => Arc::new(SqliteCheckpointer::open(&path).with_context(|| format!("opening checkpoint database at {path}"))?),
        None => {
            output::warning("no --checkpoint-db configured; checkpoints will not survive a restart");
            Arc::new(InMemoryCheckpointer::new())
        }
    };

    let git_engine = Arc::new(GitSyncEngine::new(git_cache_dir));
    let git_settings = GitSyncSettings {
        branch: std::env::var("ORCH_GIT_BRANCH").unwrap_or_else(|_| "main".to_string()),
        token: std::env::var("ORCH_GIT_TOKEN").ok(),
    };

    let runtime_config = RuntimeConfig::from_env();

    let app = Arc::new(AppState::new(k8s, checkpointer, git_engine, git_settings, runtime_config));
    let router = orch_ws::build_router(app);

    let listener = tokio::net::TcpListener::bind(&listen).await.with_context(|| format!("binding listener on {listen}"))?;
    info!(%listen, "orch-server listening");
    output::success(&format!("listening on {listen}"));

    axum::serve(listener, router).await.context("serving http")?;

    Ok(())
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

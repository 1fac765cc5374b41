//! Shared state every connection handler reaches into: the session
//! manager, the checkpointer, the git sync adapter, and the per-session
//! registry.

use std::sync::Arc;

use orch_agent::RuntimeConfig;
use orch_core::Checkpointer;
use orch_git::GitSyncEngine;
use orch_k8s::SessionManager;

use crate::registry::SessionRegistry;

/// Git remote settings shared by every project's sync, except the
/// project-specific URL carried on `Session::git`.
pub struct GitSyncSettings {
    pub branch: String,
    pub token: Option<String>,
}

pub struct AppState {
    pub k8s: Arc<SessionManager>,
    pub checkpointer: Arc<dyn Checkpointer>,
    pub git_engine: Arc<GitSyncEngine>,
    pub git_settings: GitSyncSettings,
    pub runtime_config: RuntimeConfig,
    pub registry: SessionRegistry,
}

impl AppState {
    pub fn new(k8s: Arc<SessionManager>, checkpointer: Arc<dyn Checkpointer>, git_engine: Arc<GitSyncEngine>, git_settings: GitSyncSettings, runtime_config: RuntimeConfig) -> Self {
        Self { k8s, checkpointer, git_engine, git_settings, runtime_config, registry: SessionRegistry::new() }
    }
}

//! Per-session state kept across WebSocket connections: the session row,
//! its checkpointable controller state, the cached sandbox policy, and the
//! single-run lock plus in-flight HITL resume channel.

use std::collections::HashMap;
use std::sync::Arc;

use orch_core::{ControllerState, Decision, PendingHitl, Session};
use orch_sandbox::Policy;
use tokio::sync::{mpsc, Mutex};

pub struct SessionInner {
    pub session: Session,
    pub state: ControllerState,
    pub policy: Option<Arc<Policy>>,
}

/// One session's coordination state. `run_lock` is held for the entire
/// lifetime of a controller run, including any time spent paused awaiting
/// a `HITL_RESPONSE` — the run is not "over" until `UPDATE_COMPLETED` or
/// `ERROR`, matching the at-most-one-concurrent-run invariant.
pub struct SessionHandle {
    pub inner: Mutex<SessionInner>,
    pub run_lock: Arc<Mutex<()>>,
    pub pending_hitl: Mutex<Option<PendingHitl>>,
    pub hitl_tx: Mutex<Option<mpsc::Sender<Vec<Decision>>>>,
}

impl SessionHandle {
    fn new(session: Session, state: ControllerState) -> Self {
        Self {
            inner: Mutex::new(SessionInner { session, state, policy: None }),
            run_lock: Arc::new(Mutex::new(())),
            pending_hitl: Mutex::new(None),
            hitl_tx: Mutex::new(None),
        }
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Returns the existing handle for `session_id`, or builds one from
    /// `session` and `state` (typically a restored checkpoint) if this is
    /// the first time the session is seen by this process.
    pub async fn get_or_create(&self, session_id: &str, session: Session, state: ControllerState) -> Arc<SessionHandle> {
        let mut sessions = self.sessions.lock().await;
        sessions.entry(session_id.to_string()).or_insert_with(|| Arc::new(SessionHandle::new(session, state))).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_core::SessionId;

    fn sample_session(id: &str) -> Session {
        Session::new(SessionId(id.to_string()), "user|1", "a@b.com", "node-ts", "my-proj")
    }

    #[tokio::test]
    async fn get_or_create_returns_same_handle_on_second_call() {
        let registry = SessionRegistry::new();
        let a = registry.get_or_create("s1", sample_session("s1"), ControllerState::new()).await;
        let b = registry.get_or_create("s1", sample_session("s1"), ControllerState::new()).await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn get_returns_none_before_first_init() {
        let registry = SessionRegistry::new();
        assert!(registry.get("unknown").await.is_none());
    }
}

use std::collections::HashMap;
use std::sync::Mutex;

use super::{Checkpoint, Checkpointer};
use crate::controller::ControllerState;
use crate::error::Result;

/// Process-local checkpointer used by tests and by single-replica
/// deployments that accept losing in-flight state across a restart.
#[derive(Default)]
pub struct InMemoryCheckpointer {
    threads: Mutex<HashMap<(String, String), Vec<Checkpoint>>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Checkpointer for InMemoryCheckpointer {
    fn put(&self, thread_id: &str, namespace: &str, state: &ControllerState) -> Result<u64> {
        let mut threads = self.threads.lock().unwrap();
        let key = (thread_id.to_string(), namespace.to_string());
        let entries = threads.entry(key).or_default();
        let seq = entries.len() as u64;
        entries.push(Checkpoint { seq, state: state.clone() });
        Ok(seq)
    }

    fn get_latest(&self, thread_id: &str, namespace: &str) -> Result<Option<Checkpoint>> {
        let threads = self.threads.lock().unwrap();
        let key = (thread_id.to_string(), namespace.to_string());
        Ok(threads.get(&key).and_then(|entries| entries.last().cloned()))
    }

    fn list_writes(&self, thread_id: &str, namespace: &str) -> Result<Vec<u64>> {
        let threads = self.threads.lock().unwrap();
        let key = (thread_id.to_string(), namespace.to_string());
        Ok(threads.get(&key).map(|entries| entries.iter().map(|c| c.seq).collect()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_assigns_increasing_sequence() {
        let cp = InMemoryCheckpointer::new();
        let seq0 = cp.put("sess-1", "main", &ControllerState::new()).unwrap();
        let seq1 = cp.put("sess-1", "main", &ControllerState::new()).unwrap();
        assert_eq!(seq0, 0);
        assert_eq!(seq1, 1);
    }

    #[test]
    fn get_latest_returns_most_recent() {
        let cp = InMemoryCheckpointer::new();
        let mut state = ControllerState::new();
        state.attempt = 1;
        cp.put("sess-1", "main", &state).unwrap();
        state.attempt = 2;
        cp.put("sess-1", "main", &state).unwrap();
        let latest = cp.get_latest("sess-1", "main").unwrap().unwrap();
        assert_eq!(latest.state.attempt, 2);
    }

    #[test]
    fn threads_are_isolated_by_thread_id() {
        let cp = InMemoryCheckpointer::new();
        cp.put("sess-1", "main", &ControllerState::new()).unwrap();
        assert!(cp.get_latest("sess-2", "main").unwrap().is_none());
    }

    #[test]
    fn list_writes_empty_for_unknown_thread() {
        let cp = InMemoryCheckpointer::new();
        assert!(cp.list_writes("nope", "main").unwrap().is_empty());
    }
}

//! Checkpointer: durable storage for [`ControllerState`], keyed by
//! `(thread_id, namespace)` the way a LangGraph-style checkpointer is keyed.
//! `thread_id` is a session id; `namespace` separates concurrent branches of
//! the same session (currently always `"main"`, reserved for future
//! multi-branch runs).

mod memory;
mod sqlite;

pub use memory::InMemoryCheckpointer;
pub use sqlite::SqliteCheckpointer;

use crate::controller::ControllerState;
use crate::error::Result;

/// One saved point-in-time snapshot, ordered by `seq` within a thread.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub seq: u64,
    pub state: ControllerState,
}

pub trait Checkpointer: Send + Sync {
    /// Appends a new checkpoint for `thread_id`/`namespace`, returning its
    /// assigned sequence number.
    fn put(&self, thread_id: &str, namespace: &str, state: &ControllerState) -> Result<u64>;

    /// The most recently written checkpoint, if any.
    fn get_latest(&self, thread_id: &str, namespace: &str) -> Result<Option<Checkpoint>>;

    /// Sequence numbers of all checkpoints written for a thread, oldest
    /// first — used to reconstruct how many self-heal rounds already ran
    /// after a controller process restart.
    fn list_writes(&self, thread_id: &str, namespace: &str) -> Result<Vec<u64>>;
}

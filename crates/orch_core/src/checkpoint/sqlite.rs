use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::{Checkpoint, Checkpointer};
use crate::controller::ControllerState;
use crate::error::{OrchError, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id TEXT NOT NULL,
    namespace TEXT NOT NULL,
    seq INTEGER NOT NULL,
    state_json TEXT NOT NULL,
    PRIMARY KEY (thread_id, namespace, seq)
);
";

/// Durable checkpointer backed by a single SQLite file opened in WAL mode,
/// the same connection convention the rest of the orchestrator's on-disk
/// state uses.
pub struct SqliteCheckpointer {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointer {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| OrchError::Checkpoint(e.to_string()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
            .map_err(|e| OrchError::Checkpoint(e.to_string()))?;
        conn.execute_batch(SCHEMA).map_err(|e| OrchError::Checkpoint(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| OrchError::Checkpoint(e.to_string()))?;
        conn.execute_batch(SCHEMA).map_err(|e| OrchError::Checkpoint(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl Checkpointer for SqliteCheckpointer {
    fn put(&self, thread_id: &str, namespace: &str, state: &ControllerState) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let next_seq: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(seq), -1) + 1 FROM checkpoints WHERE thread_id = ?1 AND namespace = ?2",
                params![thread_id, namespace],
                |row| row.get(0),
            )
            .map_err(|e| OrchError::Checkpoint(e.to_string()))?;
        let state_json = serde_json::to_string(state)?;
        conn.execute(
            "INSERT INTO checkpoints (thread_id, namespace, seq, state_json) VALUES (?1, ?2, ?3, ?4)",
            params![thread_id, namespace, next_seq, state_json],
        )
        .map_err(|e| OrchError::Checkpoint(e.to_string()))?;
        Ok(next_seq as u64)
    }

    fn get_latest(&self, thread_id: &str, namespace: &str) -> Result<Option<Checkpoint>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT seq, state_json FROM checkpoints WHERE thread_id = ?1 AND namespace = ?2 ORDER BY seq DESC LIMIT 1",
                params![thread_id, namespace],
                |row| {
                    let seq: i64 = row.get(0)?;
                    let state_json: String = row.get(1)?;
                    Ok((seq, state_json))
                },
            )
            .ok();
        match row {
            Some((seq, state_json)) => {
                let state: ControllerState = serde_json::from_str(&state_json)?;
                Ok(Some(Checkpoint { seq: seq as u64, state }))
            }
            None => Ok(None),
        }
    }

    fn list_writes(&self, thread_id: &str, namespace: &str) -> Result<Vec<u64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT seq FROM checkpoints WHERE thread_id = ?1 AND namespace = ?2 ORDER BY seq ASC")
            .map_err(|e| OrchError::Checkpoint(e.to_string()))?;
        let rows = stmt
            .query_map(params![thread_id, namespace], |row| row.get::<_, i64>(0))
            .map_err(|e| OrchError::Checkpoint(e.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| OrchError::Checkpoint(e.to_string()))? as u64);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get_latest_roundtrip() {
        let cp = SqliteCheckpointer::open_in_memory().unwrap();
        let mut state = ControllerState::new();
        state.attempt = 2;
        let seq = cp.put("sess-1", "main", &state).unwrap();
        assert_eq!(seq, 0);
        let latest = cp.get_latest("sess-1", "main").unwrap().unwrap();
        assert_eq!(latest.state.attempt, 2);
    }

    #[test]
    fn sequence_increments_across_puts() {
        let cp = SqliteCheckpointer::open_in_memory().unwrap();
        cp.put("sess-1", "main", &ControllerState::new()).unwrap();
        let seq = cp.put("sess-1", "main", &ControllerState::new()).unwrap();
        assert_eq!(seq, 1);
        assert_eq!(cp.list_writes("sess-1", "main").unwrap(), vec![0, 1]);
    }

    #[test]
    fn open_creates_persistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.db");
        {
            let cp = SqliteCheckpointer::open(&path).unwrap();
            cp.put("sess-1", "main", &ControllerState::new()).unwrap();
        }
        let cp = SqliteCheckpointer::open(&path).unwrap();
        assert!(cp.get_latest("sess-1", "main").unwrap().is_some());
    }
}

//! SQLite-backed checkpointer. Workflow progress survives process restarts.
//!
//! Table keyed by `(thread_id, checkpoint_id)` with the parent link, JSON
//! state and metadata, and `created_at` (RFC 3339). A secondary index on
//! `(thread_id, created_at)` serves latest-by-thread retrieval.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::graph::WorkflowState;

use super::checkpoint::{Checkpoint, CheckpointMetadata};
use super::checkpointer::{CheckpointError, Checkpointer};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id TEXT NOT NULL,
    checkpoint_id TEXT NOT NULL,
    parent_checkpoint_id TEXT,
    state TEXT NOT NULL,
    metadata TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (thread_id, checkpoint_id)
);
CREATE INDEX IF NOT EXISTS idx_checkpoints_thread_created
    ON checkpoints (thread_id, created_at);
";

/// SQLite checkpoint store. Calls are short and synchronous; the connection
/// is guarded by a mutex that is never held across an await.
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database; used by tests.
    pub fn open_in_memory() -> Result<Self, CheckpointError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_checkpoint(
        id: String,
        parent_id: Option<String>,
        state: String,
        metadata: String,
        created_at: String,
    ) -> Result<Checkpoint, CheckpointError> {
        let state: WorkflowState = serde_json::from_str(&state)?;
        let metadata: CheckpointMetadata = serde_json::from_str(&metadata)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?
            .with_timezone(&Utc);
        Ok(Checkpoint {
            id,
            parent_id,
            state,
            metadata,
            created_at,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CheckpointError> {
        self.conn
            .lock()
            .map_err(|_| CheckpointError::Storage("connection mutex poisoned".into()))
    }
}

#[async_trait]
impl Checkpointer for SqliteCheckpointStore {
    async fn put(
        &self,
        thread_id: &str,
        checkpoint: &Checkpoint,
    ) -> Result<String, CheckpointError> {
        let state = serde_json::to_string(&checkpoint.state)?;
        let metadata = serde_json::to_string(&checkpoint.metadata)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO checkpoints
                 (thread_id, checkpoint_id, parent_checkpoint_id, state, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                thread_id,
                checkpoint.id,
                checkpoint.parent_id,
                state,
                metadata,
                checkpoint.created_at.to_rfc3339(),
            ],
        )?;
        Ok(checkpoint.id.clone())
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT checkpoint_id, parent_checkpoint_id, state, metadata, created_at
                 FROM checkpoints WHERE thread_id = ?1
                 ORDER BY created_at DESC, checkpoint_id DESC LIMIT 1",
                params![thread_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((id, parent, state, metadata, created_at)) => Ok(Some(Self::row_to_checkpoint(
                id, parent, state, metadata, created_at,
            )?)),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        thread_id: &str,
        limit: Option<usize>,
        before: Option<&str>,
    ) -> Result<Vec<Checkpoint>, CheckpointError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT checkpoint_id, parent_checkpoint_id, state, metadata, created_at
             FROM checkpoints WHERE thread_id = ?1
             ORDER BY created_at ASC, checkpoint_id ASC",
        )?;
        let rows = stmt.query_map(params![thread_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut items = Vec::new();
        for row in rows {
            let (id, parent, state, metadata, created_at) = row?;
            items.push(Self::row_to_checkpoint(id, parent, state, metadata, created_at)?);
        }
        if let Some(b) = before {
            if let Some(pos) = items.iter().position(|c| c.id == b) {
                items.truncate(pos);
            }
        }
        if let Some(n) = limit {
            if items.len() > n {
                items = items.split_off(items.len() - n);
            }
        }
        Ok(items)
    }

    async fn sweep_expired(&self, ttl: Duration) -> Result<usize, CheckpointError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(ttl)
                .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        let conn = self.lock()?;
        let dropped = conn.execute(
            "DELETE FROM checkpoints WHERE thread_id IN (
                 SELECT thread_id FROM checkpoints
                 GROUP BY thread_id
                 HAVING MAX(created_at) < ?1
             )",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(dropped)
    }
}

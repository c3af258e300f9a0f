//! Checkpointer trait: pluggable storage for checkpoint chains.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::checkpoint::Checkpoint;

/// Errors from checkpoint storage.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for CheckpointError {
    fn from(e: rusqlite::Error) -> Self {
        CheckpointError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for CheckpointError {
    fn from(e: serde_json::Error) -> Self {
        CheckpointError::Serialization(e.to_string())
    }
}

/// Storage for per-thread checkpoint chains. At most one active step runs per
/// instance, so the engine is always the last writer for a thread.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Persists a checkpoint for the thread; returns its id.
    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint)
        -> Result<String, CheckpointError>;

    /// Latest checkpoint for the thread, if any.
    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Checkpoints for the thread, oldest first. `before` cuts the window at
    /// (excluding) the named checkpoint; `limit` keeps the newest N.
    async fn list(
        &self,
        thread_id: &str,
        limit: Option<usize>,
        before: Option<&str>,
    ) -> Result<Vec<Checkpoint>, CheckpointError>;

    /// Removes threads whose newest checkpoint is older than `ttl`. Returns
    /// the number of threads dropped.
    async fn sweep_expired(&self, ttl: Duration) -> Result<usize, CheckpointError>;
}

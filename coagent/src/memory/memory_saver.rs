//! In-memory checkpointer. Not persistent; for dev and tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::checkpoint::Checkpoint;
use super::checkpointer::{CheckpointError, Checkpointer};

/// In-memory checkpointer. Key: thread_id; each thread holds its checkpoints
/// newest last.
pub struct MemorySaver {
    by_thread: RwLock<HashMap<String, Vec<Checkpoint>>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self {
            by_thread: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemorySaver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Checkpointer for MemorySaver {
    async fn put(
        &self,
        thread_id: &str,
        checkpoint: &Checkpoint,
    ) -> Result<String, CheckpointError> {
        let mut guard = self.by_thread.write().await;
        guard
            .entry(thread_id.to_string())
            .or_default()
            .push(checkpoint.clone());
        Ok(checkpoint.id.clone())
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let guard = self.by_thread.read().await;
        Ok(guard.get(thread_id).and_then(|list| list.last().cloned()))
    }

    async fn list(
        &self,
        thread_id: &str,
        limit: Option<usize>,
        before: Option<&str>,
    ) -> Result<Vec<Checkpoint>, CheckpointError> {
        let guard = self.by_thread.read().await;
        let mut items = guard.get(thread_id).cloned().unwrap_or_default();
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
        let mut guard = self.by_thread.write().await;
        let before = guard.len();
        guard.retain(|_, list| {
            list.last()
                .map(|cp| cp.created_at > cutoff)
                .unwrap_or(false)
        });
        Ok(before - guard.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::WorkflowState;
    use crate::memory::CheckpointMetadata;

    fn checkpoint(parent: Option<String>, step: i64) -> Checkpoint {
        Checkpoint::new(
            WorkflowState::default(),
            parent,
            CheckpointMetadata {
                step,
                node: "n".into(),
                status: "running".into(),
                graph: "g".into(),
            },
        )
    }

    /// **Scenario**: latest returns the newest checkpoint per thread; threads
    /// are isolated.
    #[tokio::test]
    async fn latest_per_thread() {
        let saver = MemorySaver::new();
        let first = checkpoint(None, 1);
        let second = checkpoint(Some(first.id.clone()), 2);
        saver.put("t1", &first).await.unwrap();
        saver.put("t1", &second).await.unwrap();
        saver.put("t2", &checkpoint(None, 1)).await.unwrap();

        let latest = saver.latest("t1").await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert!(saver.latest("t3").await.unwrap().is_none());
    }

    /// **Scenario**: list supports before/limit windows, oldest first.
    #[tokio::test]
    async fn list_windows() {
        let saver = MemorySaver::new();
        let mut parent = None;
        let mut ids = vec![];
        for step in 0..4 {
            let cp = checkpoint(parent.clone(), step);
            parent = Some(cp.id.clone());
            ids.push(cp.id.clone());
            saver.put("t", &cp).await.unwrap();
        }
        let all = saver.list("t", None, None).await.unwrap();
        assert_eq!(all.len(), 4);
        let windowed = saver.list("t", Some(2), Some(&ids[3])).await.unwrap();
        assert_eq!(windowed.len(), 2);
        assert_eq!(windowed[1].id, ids[2]);
    }

    /// **Scenario**: sweep_expired drops threads whose newest checkpoint is
    /// past the TTL and keeps fresh ones.
    #[tokio::test]
    async fn sweep_drops_expired_threads() {
        let saver = MemorySaver::new();
        let mut stale = checkpoint(None, 1);
        stale.created_at = Utc::now() - chrono::Duration::hours(48);
        saver.put("stale", &stale).await.unwrap();
        saver.put("fresh", &checkpoint(None, 1)).await.unwrap();

        let dropped = saver
            .sweep_expired(Duration::from_secs(86_400))
            .await
            .unwrap();
        assert_eq!(dropped, 1);
        assert!(saver.latest("stale").await.unwrap().is_none());
        assert!(saver.latest("fresh").await.unwrap().is_some());
    }
}

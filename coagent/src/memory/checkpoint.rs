//! Checkpoint: one persisted snapshot of a workflow thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::WorkflowState;

/// Per-checkpoint metadata: where the thread was and why it stopped there.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Step counter, monotonically increasing within a thread.
    pub step: i64,
    /// Node the thread was at when this checkpoint was taken.
    pub node: String,
    /// Instance status at save time (`running`, `interrupted`, `completed`).
    pub status: String,
    /// Graph name, so a resume can rebind the thread after a restart.
    pub graph: String,
}

/// One snapshot of thread state. `parent_id` links checkpoints into a
/// single-parent chain per thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub parent_id: Option<String>,
    pub state: WorkflowState,
    pub metadata: CheckpointMetadata,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        state: WorkflowState,
        parent_id: Option<String>,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            parent_id,
            state,
            metadata,
            created_at: Utc::now(),
        }
    }
}

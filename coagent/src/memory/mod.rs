//! Checkpoint persistence for workflow threads.
//!
//! Checkpoints form a single-parent chain per `thread_id`; the latest
//! checkpoint fully determines resumable state. Two stores: [`MemorySaver`]
//! (per-process, dev and tests) and [`SqliteCheckpointStore`] (survives
//! restarts).

mod checkpoint;
mod checkpointer;
mod memory_saver;
mod sqlite_store;

pub use checkpoint::{Checkpoint, CheckpointMetadata};
pub use checkpointer::{CheckpointError, Checkpointer};
pub use memory_saver::MemorySaver;
pub use sqlite_store::SqliteCheckpointStore;

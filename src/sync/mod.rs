// Persistence synchronization module
//
// Wires an actor's snapshot to the shared storage collaborator through the
// leader elector: the leader writes with trailing-edge debouncing, followers
// observe the storage change feed and apply external snapshots back into
// their local actor.

pub mod debounce;
pub mod persistence_sync;

use crate::storage::StorageError;

// Re-export main types for convenient access
pub use debounce::{DebounceTrigger, Debouncer};
pub use persistence_sync::{PersistedSnapshot, PersistenceSync};

/// Errors raised by the sync engine. Cloneable so background save failures
/// can fan out on the engine's error feed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// Storage failure; propagated to the caller, never retried internally
    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    /// Snapshot payload could not be serialized or deserialized
    #[error("Snapshot serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

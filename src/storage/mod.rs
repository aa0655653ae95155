// Storage collaborator module
//
// Abstract key/value store shared by uncoordinated clients, with a change
// feed that reaches every client sharing the same backing store. Concrete
// engines (IndexedDB, SQL, ...) live with the embedding application; the
// crate ships one in-process implementation for tests and demos.

pub mod memory_store;

use async_trait::async_trait;
use tokio::sync::broadcast;

// Re-export main types for convenient access
pub use memory_store::MemoryStore;

/// Errors raised by storage operations. These are typically non-transient,
/// so callers decide whether to retry; the crate never retries internally.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("Storage read failed for key '{key}': {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Storage write failed for key '{key}': {reason}")]
    WriteFailed { key: String, reason: String },
}

/// A committed change to the store, delivered to change-feed subscribers.
/// `value` is `None` when the key was removed.
#[derive(Debug, Clone)]
pub struct StorageChange {
    pub key: String,
    pub value: Option<String>,
}

/// Shared durable key/value store collaborator.
///
/// Change notifications must reach other clients sharing the same backing
/// store; a store may, but need not, also deliver a writer's own change back
/// to the writer. Consumers filter the feed by `key` themselves; dropping
/// the receiver unsubscribes.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn put(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn subscribe_to_changes(&self) -> broadcast::Receiver<StorageChange>;
}

//! # In-Memory Store
//!
//! In-process `Storage` implementation backed by a `HashMap` and a broadcast
//! change feed. Multiple logical clients share one store by cloning the
//! `Arc`, which makes it the standard collaborator for tests and demos of
//! the election and sync protocols.

use super::{Storage, StorageChange, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

/// Shared in-memory key/value store with change notifications.
///
/// Change notifications are delivered to every subscriber, including the
/// writer's own subscriptions; the `Storage` contract permits this and
/// consumers are expected to tolerate it.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    /// Create a store whose change feed buffers up to `capacity` events per
    /// lagging subscriber.
    pub fn new(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        Self {
            entries: RwLock::new(HashMap::new()),
            changes,
        }
    }

    fn notify(&self, change: StorageChange) {
        // send() errors when there are no subscribers; that is fine here
        let _ = self.changes.send(change);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.clone());
        drop(entries);

        trace!(key = %key, "Stored value");
        self.notify(StorageChange {
            key: key.to_string(),
            value: Some(value),
        });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(key).is_some();
        drop(entries);

        if removed {
            self.notify(StorageChange {
                key: key.to_string(),
                value: None,
            });
        }
        Ok(())
    }

    fn subscribe_to_changes(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_remove_roundtrip() {
        let store = MemoryStore::default();
        assert_eq!(store.get("door").await.unwrap(), None);

        store.put("door", "open".to_string()).await.unwrap();
        assert_eq!(store.get("door").await.unwrap(), Some("open".to_string()));

        store.remove("door").await.unwrap();
        assert_eq!(store.get("door").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_changes_reach_all_subscribers() {
        let store = MemoryStore::default();
        let mut first = store.subscribe_to_changes();
        let mut second = store.subscribe_to_changes();

        store.put("door", "open".to_string()).await.unwrap();

        for receiver in [&mut first, &mut second] {
            let change = receiver.recv().await.unwrap();
            assert_eq!(change.key, "door");
            assert_eq!(change.value, Some("open".to_string()));
        }
    }

    #[tokio::test]
    async fn test_remove_of_missing_key_is_silent() {
        let store = MemoryStore::default();
        let mut changes = store.subscribe_to_changes();

        store.remove("missing").await.unwrap();
        store.put("present", "1".to_string()).await.unwrap();

        // The only notification is the put; the no-op remove produced none
        let change = changes.recv().await.unwrap();
        assert_eq!(change.key, "present");
    }
}

//! # Leader Elector
//!
//! Last-writer-wins leader election over a shared key/value store.
//!
//! This is a non-quorum protocol that trades strict exclusivity for
//! simplicity: `claim` unconditionally overwrites the leader slot with no
//! compare-and-set, so any client may take leadership from any other at any
//! time. The intended policy is to claim once at startup and again whenever
//! the client regains focus, which makes the most recently focused client
//! the leader. Two clients racing `claim` at the same instant can both
//! briefly read themselves as leader until the later write lands; there is
//! no generation counter or fencing token.
//!
//! A client that terminates without calling `release` leaves a stale slot
//! behind. That is self-healing: the next client to `claim` silently takes
//! over.

use crate::storage::{Storage, StorageError};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Per-client election handle with a randomly generated identity.
pub struct LeaderElector {
    self_id: String,
    storage: Arc<dyn Storage>,
}

impl LeaderElector {
    /// Create an elector with a fresh random `self_id`. One elector per
    /// client process/tab; the id lives as long as the elector.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let self_id = Uuid::new_v4().to_string();
        debug!(self_id = %self_id, "Leader elector created");
        Self { self_id, storage }
    }

    /// This client's identity as written into leader slots.
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    fn leader_slot(key: &str) -> String {
        format!("{key}::leader")
    }

    /// Unconditionally take leadership of `key`, overwriting any current
    /// holder.
    pub async fn claim(&self, key: &str) -> Result<(), StorageError> {
        self.storage
            .put(&Self::leader_slot(key), self.self_id.clone())
            .await?;
        info!(key = %key, self_id = %self.self_id, "👑 Claimed leadership");
        Ok(())
    }

    /// Whether this client currently holds the leader slot for `key`.
    pub async fn is_leader(&self, key: &str) -> Result<bool, StorageError> {
        let holder = self.storage.get(&Self::leader_slot(key)).await?;
        Ok(holder.as_deref() == Some(self.self_id.as_str()))
    }

    /// Graceful release on shutdown: clear the slot only if this client is
    /// still the holder, so the next focused client can claim without
    /// waiting out a stale entry.
    pub async fn release(&self, key: &str) -> Result<(), StorageError> {
        if self.is_leader(key).await? {
            self.storage.remove(&Self::leader_slot(key)).await?;
            info!(key = %key, self_id = %self.self_id, "Released leadership");
        }
        Ok(())
    }
}

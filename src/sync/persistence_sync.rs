//! # Persistence Sync Engine
//!
//! Connects one actor to the shared storage collaborator through the leader
//! elector.
//!
//! Write path (leader only): every actor change requests a save through the
//! trailing-edge debouncer, so at most one write lands per debounce window
//! and the final snapshot is always eventually persisted. Leadership is
//! checked at flush time, not at trigger time, so a demoted client quietly
//! stops writing on its next flush. A failed background save is never
//! retried; the error is published on the engine's error feed
//! (`subscribe_errors`) so the embedder can react.
//!
//! Read path (follower only): a dedicated task watches the storage change
//! feed for the sync key. When a change arrives and this client is not the
//! leader, the payload is deserialized and applied into the local actor via
//! `Actor::restore` — a trusted out-of-band replacement that bypasses the
//! transition function. An `applying` flag is held around the apply so the
//! write path does not echo the very update it just received back into
//! storage, which would otherwise ping-pong writes between clients.
//!
//! A client that becomes leader does not replay missed writes; it simply
//! begins persisting its own current snapshot going forward.

use crate::actor::{Actor, SubscriptionId};
use crate::election::LeaderElector;
use crate::machine::Snapshot;
use crate::storage::Storage;
use crate::sync::debounce::Debouncer;
use crate::sync::SyncError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Envelope written to storage. The payload is the serialized snapshot; the
/// sync engine never inspects its contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl PersistedSnapshot {
    pub fn encode<T: Serialize>(value: &T) -> Result<String, SyncError> {
        let envelope = Self {
            payload: serde_json::to_value(value)?,
            updated_at: Utc::now(),
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, SyncError> {
        let envelope: Self = serde_json::from_str(raw)?;
        Ok(serde_json::from_value(envelope.payload)?)
    }
}

/// Leader/follower snapshot synchronization for one actor and one key.
///
/// Dropping the engine detaches it: the actor subscription is removed and
/// both background tasks are aborted. In-flight flushes are not cancelled
/// mid-write, but their callbacks check actor liveness before touching
/// anything.
pub struct PersistenceSync<S, C, E>
where
    S: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    key: String,
    actor: Weak<Actor<S, C, E>>,
    storage: Arc<dyn Storage>,
    elector: Arc<LeaderElector>,
    applying: Arc<AtomicBool>,
    subscription: SubscriptionId,
    debouncer: Debouncer,
    reader_task: JoinHandle<()>,
    errors: broadcast::Sender<SyncError>,
}

impl<S, C, E> PersistenceSync<S, C, E>
where
    S: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
    C: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
    E: Send + 'static,
{
    /// Wire `actor` to `storage` under `key`, debouncing leader writes with
    /// `window`. Must be called from within a Tokio runtime.
    pub fn attach(
        actor: &Arc<Actor<S, C, E>>,
        storage: Arc<dyn Storage>,
        elector: Arc<LeaderElector>,
        key: impl Into<String>,
        window: Duration,
    ) -> Self {
        let key = key.into();
        let applying = Arc::new(AtomicBool::new(false));
        let (errors, _) = broadcast::channel(64);

        // Write path: debounced, leader-gated save of the latest snapshot
        let flush_actor = Arc::downgrade(actor);
        let flush_storage = storage.clone();
        let flush_elector = elector.clone();
        let flush_key = key.clone();
        let flush_errors = errors.clone();
        let debouncer = Debouncer::new(window, move || {
            let actor = flush_actor.clone();
            let storage = flush_storage.clone();
            let elector = flush_elector.clone();
            let key = flush_key.clone();
            let errors = flush_errors.clone();
            async move {
                if let Err(error) = save_if_leader(&actor, &storage, &elector, &key).await {
                    warn!(key = %key, error = %error, "Persistence save failed");
                    let _ = errors.send(error);
                }
            }
        });

        // Actor changes request a save unless they originate from our own
        // follower apply (reentrancy guard)
        let trigger = debouncer.handle();
        let applying_writes = applying.clone();
        let subscription = actor.subscribe(move |_snapshot| {
            if applying_writes.load(Ordering::Acquire) {
                return;
            }
            trigger.trigger();
        });

        // Read path: follower applies external snapshots from the change feed
        let mut changes = storage.subscribe_to_changes();
        let reader_actor = Arc::downgrade(actor);
        let reader_elector = elector.clone();
        let reader_applying = applying.clone();
        let reader_key = key.clone();
        let reader_task = tokio::spawn(async move {
            use tokio::sync::broadcast::error::RecvError;
            loop {
                let change = match changes.recv().await {
                    Ok(change) => change,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(key = %reader_key, skipped, "Change feed lagged; continuing");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if change.key != reader_key {
                    continue;
                }
                let Some(value) = change.value else {
                    continue;
                };
                let Some(actor) = reader_actor.upgrade() else {
                    break;
                };
                if !actor.is_running() {
                    break;
                }
                if reader_applying.load(Ordering::Acquire) {
                    continue;
                }
                match reader_elector.is_leader(&reader_key).await {
                    Ok(true) => continue,
                    Ok(false) => {}
                    Err(error) => {
                        warn!(key = %reader_key, error = %error, "Leadership read failed");
                        continue;
                    }
                }
                match PersistedSnapshot::decode::<Snapshot<S, C>>(&value) {
                    Ok(snapshot) => {
                        reader_applying.store(true, Ordering::Release);
                        actor.restore(snapshot);
                        reader_applying.store(false, Ordering::Release);
                        debug!(key = %reader_key, "Applied external snapshot");
                    }
                    Err(error) => {
                        warn!(key = %reader_key, error = %error, "Ignoring undecodable snapshot");
                    }
                }
            }
        });

        Self {
            key,
            actor: Arc::downgrade(actor),
            storage,
            elector,
            applying,
            subscription,
            debouncer,
            reader_task,
            errors,
        }
    }

    /// The storage key this engine synchronizes.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the engine is currently mid-apply on the read path.
    pub fn is_applying(&self) -> bool {
        self.applying.load(Ordering::Acquire)
    }

    /// Receive failures from the background save path. Failed saves are
    /// never retried; each failure is published here exactly once. Errors
    /// from a manual `flush_now` are returned to its caller directly and do
    /// not appear on this feed.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<SyncError> {
        self.errors.subscribe()
    }

    /// Persist the current snapshot right now, bypassing the debounce
    /// window. Returns `Ok(true)` if a write happened and `Ok(false)` if it
    /// was skipped because this client is not the leader or the actor is
    /// gone. Storage failures propagate; they are never retried here.
    pub async fn flush_now(&self) -> Result<bool, SyncError> {
        save_if_leader(&self.actor, &self.storage, &self.elector, &self.key).await
    }
}

impl<S, C, E> Drop for PersistenceSync<S, C, E>
where
    S: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    fn drop(&mut self) {
        self.reader_task.abort();
        self.debouncer.cancel();
        if let Some(actor) = self.actor.upgrade() {
            actor.unsubscribe(self.subscription);
        }
    }
}

async fn save_if_leader<S, C, E>(
    actor: &Weak<Actor<S, C, E>>,
    storage: &Arc<dyn Storage>,
    elector: &Arc<LeaderElector>,
    key: &str,
) -> Result<bool, SyncError>
where
    S: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
    C: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
    E: Send + 'static,
{
    let Some(actor) = actor.upgrade() else {
        return Ok(false);
    };
    if !actor.is_running() {
        return Ok(false);
    }
    if !elector.is_leader(key).await? {
        return Ok(false);
    }

    let payload = PersistedSnapshot::encode(&actor.snapshot())?;
    storage.put(key, payload).await?;
    debug!(key = %key, "Persisted snapshot");
    Ok(true)
}

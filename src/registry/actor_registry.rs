//! # Actor Registry
//!
//! Thread-safe registry of running actor instances with parent/child
//! tracking.
//!
//! The registry is an arena-style map keyed by instance id; the parent/child
//! forest is derived from the flat map by filtering on `parent_id`, so there
//! are no back-pointers from child to parent and no ownership cycles. All
//! read-modify-write sequences on the map (duplicate check + insert, lookup +
//! remove) run under one write lock, so concurrent spawns can never lose a
//! registration.

use crate::actor::Actor;
use crate::machine::MachineDefinition;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Errors raised by registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Spawn with an instance id that is already registered
    #[error("Actor instance '{0}' is already registered")]
    DuplicateInstance(String),

    /// Spawn naming a parent instance that is not registered
    #[error("Parent instance '{0}' is not registered")]
    ParentNotFound(String),
}

/// Type-erased view of a running actor, enough for lifecycle management.
/// Callers keep the typed `Arc<Actor<_, _, _>>` returned by `spawn` for
/// sending events.
pub trait ManagedActor: Send + Sync {
    fn stop(&self);
    fn is_running(&self) -> bool;
}

impl<S, C, E> ManagedActor for Actor<S, C, E>
where
    S: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    fn stop(&self) {
        Actor::stop(self);
    }

    fn is_running(&self) -> bool {
        Actor::is_running(self)
    }
}

/// A registered actor instance
#[derive(Clone)]
pub struct ActorInstance {
    pub instance_id: String,
    pub machine_id: String,
    pub parent_id: Option<String>,
    pub handle: Arc<dyn ManagedActor>,
    pub spawned_at: DateTime<Utc>,
}

impl fmt::Debug for ActorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorInstance")
            .field("instance_id", &self.instance_id)
            .field("machine_id", &self.machine_id)
            .field("parent_id", &self.parent_id)
            .field("spawned_at", &self.spawned_at)
            .finish_non_exhaustive()
    }
}

/// Registry for managing actor instances
pub struct ActorRegistry {
    instances: Arc<RwLock<HashMap<String, ActorInstance>>>,
}

impl ActorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            instances: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Spawn a new actor for `definition` under `instance_id`.
    ///
    /// Fails with `DuplicateInstance` if the id is taken and with
    /// `ParentNotFound` if `parent_id` names an unregistered instance. The
    /// duplicate check, parent check, and insert happen atomically under the
    /// registry's write lock.
    pub async fn spawn<S, C, E>(
        &self,
        definition: Arc<MachineDefinition<S, C, E>>,
        instance_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Arc<Actor<S, C, E>>, RegistryError>
    where
        S: Clone + Send + Sync + 'static,
        C: Clone + Send + Sync + 'static,
        E: Send + 'static,
    {
        let mut instances = self.instances.write().await;

        if instances.contains_key(instance_id) {
            return Err(RegistryError::DuplicateInstance(instance_id.to_string()));
        }
        if let Some(parent) = parent_id {
            if !instances.contains_key(parent) {
                return Err(RegistryError::ParentNotFound(parent.to_string()));
            }
        }

        let actor = Actor::start(definition);
        instances.insert(
            instance_id.to_string(),
            ActorInstance {
                instance_id: instance_id.to_string(),
                machine_id: actor.machine_id().to_string(),
                parent_id: parent_id.map(str::to_string),
                handle: actor.clone(),
                spawned_at: Utc::now(),
            },
        );

        info!(
            instance_id = %instance_id,
            machine_id = actor.machine_id(),
            parent_id = parent_id,
            "Spawned actor instance"
        );
        Ok(actor)
    }

    /// Look up an instance by id
    pub async fn get(&self, instance_id: &str) -> Option<ActorInstance> {
        let instances = self.instances.read().await;
        instances.get(instance_id).cloned()
    }

    /// Direct children of `parent_id`, in unspecified order
    pub async fn get_children(&self, parent_id: &str) -> Vec<ActorInstance> {
        let instances = self.instances.read().await;
        instances
            .values()
            .filter(|instance| instance.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect()
    }

    /// Stop and remove an instance. Stopping an unknown or already-stopped
    /// id is a no-op, not an error.
    pub async fn stop(&self, instance_id: &str) {
        let mut instances = self.instances.write().await;
        if let Some(instance) = instances.remove(instance_id) {
            instance.handle.stop();
            debug!(instance_id = %instance_id, "Stopped actor instance");
        }
    }

    /// Stop and remove every instance; used for full teardown
    pub async fn stop_all(&self) {
        let mut instances = self.instances.write().await;
        for instance in instances.values() {
            instance.handle.stop();
        }
        let stopped = instances.len();
        instances.clear();
        info!(stopped, "Stopped all actor instances");
    }

    /// Number of registered instances
    pub async fn len(&self) -> usize {
        self.instances.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.instances.read().await.is_empty()
    }
}

impl Default for ActorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Actor registry module
//
// Tracks live actor instances by id, records parent/child relationships, and
// supports atomic spawn/stop with full teardown via stop_all.

pub mod actor_registry;

// Re-export main types for convenient access
pub use actor_registry::{ActorInstance, ActorRegistry, ManagedActor, RegistryError};

// Leader election module
//
// Per-key mutual exclusion over the shared storage collaborator, deciding
// which one of several uncoordinated clients is allowed to write a resource.

pub mod leader_elector;

// Re-export main types for convenient access
pub use leader_elector::LeaderElector;

// Machine definition module
//
// Pure data descriptions of state machines: the snapshot value an actor owns,
// the transition function a consumer authors, and the deferred effects a
// transition may declare. Nothing here has runtime behavior; the interpreter
// lives in the `actor` module.

pub mod definition;
pub mod snapshot;

// Re-export main types for convenient access
pub use definition::{Effect, MachineDefinition, Transition};
pub use snapshot::Snapshot;

// Actor interpreter module
//
// A live instance of a `MachineDefinition`: owns the current snapshot,
// applies events strictly sequentially, notifies subscribers synchronously
// in subscription order, and schedules declared effects after each commit.

pub mod interpreter;

// Re-export main types for convenient access
pub use interpreter::{Actor, SubscriptionId};

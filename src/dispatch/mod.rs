// Command dispatch module
//
// Converts a high-frequency stream of small command requests into a
// low-frequency stream of larger transport calls, with bounded retry and
// visible per-batch outcomes.

pub mod command_batcher;
pub mod transport;

// Re-export main types for convenient access
pub use command_batcher::{Batch, BatchOutcome, CommandBatcher, CommandItem};
pub use transport::{Transport, TransportError};

#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Statekit Core
//!
//! State-machine/actor runtime that stays consistent across multiple
//! uncoordinated clients (browser tabs, processes) sharing one durable store
//! and one remote service, without a central coordinator.
//!
//! ## Architecture
//!
//! Four protocols compose into one pipeline:
//!
//! - An **actor runtime** interprets a [`machine::MachineDefinition`]: events
//!   are applied strictly sequentially, subscribers observe every committed
//!   snapshot synchronously and in order, and transitions may declare
//!   deferred effects that run after the commit.
//! - A **hierarchical registry** tracks actor instances by id with
//!   parent/child relationships and atomic spawn/stop.
//! - A **leader elector** decides which client may write a shared resource:
//!   last-writer-wins claims over the storage collaborator, no quorum, claims
//!   renewed on focus so the most recently focused client leads.
//! - A **persistence sync engine** wires an actor to storage through the
//!   elector: the leader persists with trailing-edge debouncing (bounded
//!   write amplification), followers apply external snapshots from the
//!   change feed behind a reentrancy guard (no write/notify feedback loops).
//!
//! Independently, a **command batcher** converts high-frequency command
//! streams into bounded batches dispatched serially with exponential-backoff
//! retry, reporting per-batch outcomes for optimistic-UI reconciliation.
//!
//! ## Module Organization
//!
//! - [`machine`] - State machine definitions, snapshots, transitions, effects
//! - [`actor`] - The interpreter running a machine definition
//! - [`registry`] - Instance tracking and lifecycle management
//! - [`storage`] - Abstract key/value collaborator + in-memory implementation
//! - [`election`] - Cross-client leader election
//! - [`sync`] - Debounced leader/follower persistence synchronization
//! - [`dispatch`] - Batched, retrying command dispatch
//! - [`config`] - Runtime tunables
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust
//! use statekit_core::machine::{MachineDefinition, Snapshot, Transition};
//! use statekit_core::actor::Actor;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum Door { Closed, Open }
//! #[derive(Debug, Clone)]
//! enum Cmd { Toggle }
//!
//! let definition = Arc::new(MachineDefinition::new(
//!     "door",
//!     Snapshot::new(Door::Closed, ()),
//!     |state, _ctx, _cmd: &Cmd| match state {
//!         Door::Closed => Transition::next(Door::Open, ()),
//!         Door::Open => Transition::next(Door::Closed, ()),
//!     },
//! ));
//!
//! let actor = Actor::start(definition);
//! actor.send(Cmd::Toggle);
//! assert_eq!(actor.snapshot().state, Door::Open);
//! ```

pub mod actor;
pub mod config;
pub mod dispatch;
pub mod election;
pub mod error;
pub mod logging;
pub mod machine;
pub mod registry;
pub mod storage;
pub mod sync;

pub use actor::{Actor, SubscriptionId};
pub use config::StatekitConfig;
pub use dispatch::{Batch, BatchOutcome, CommandBatcher, CommandItem, Transport, TransportError};
pub use election::LeaderElector;
pub use error::{Result, StatekitError};
pub use machine::{Effect, MachineDefinition, Snapshot, Transition};
pub use registry::{ActorInstance, ActorRegistry, ManagedActor, RegistryError};
pub use storage::{MemoryStore, Storage, StorageChange, StorageError};
pub use sync::{DebounceTrigger, Debouncer, PersistedSnapshot, PersistenceSync, SyncError};

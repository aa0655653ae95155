//! End-to-end scenarios exercising the actor runtime, registry, leader
//! election, persistence sync, and command dispatch together.

use serde::{Deserialize, Serialize};
use serde_json::json;
use statekit_core::actor::Actor;
use statekit_core::config::StatekitConfig;
use statekit_core::dispatch::{
    Batch, BatchOutcome, CommandBatcher, CommandItem, Transport, TransportError,
};
use statekit_core::election::LeaderElector;
use statekit_core::machine::{Effect, MachineDefinition, Snapshot, Transition};
use statekit_core::registry::ActorRegistry;
use statekit_core::storage::{MemoryStore, Storage};
use statekit_core::sync::PersistenceSync;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum RunState {
    Idle,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct RunContext {
    cycles: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RunEvent {
    Toggle,
    Settle,
}

/// Toggle driver: Idle -> Running -> Stopping, then a deferred Settle event
/// returns it to Idle once the spin-down delay elapses.
fn run_machine() -> Arc<MachineDefinition<RunState, RunContext, RunEvent>> {
    Arc::new(MachineDefinition::new(
        "run",
        Snapshot::new(RunState::Idle, RunContext { cycles: 0 }),
        |state, context, event| match (state, event) {
            (RunState::Idle, RunEvent::Toggle) => Transition::next(RunState::Running, *context),
            (RunState::Running, RunEvent::Toggle) => {
                Transition::next(RunState::Stopping, *context).with_effect(Effect::SendAfter {
                    event: RunEvent::Settle,
                    delay: Duration::from_secs(2),
                })
            }
            (RunState::Stopping, RunEvent::Settle) => Transition::next(
                RunState::Idle,
                RunContext {
                    cycles: context.cycles + 1,
                },
            ),
            _ => Transition::unchanged(),
        },
    ))
}

#[tokio::test(start_paused = true)]
async fn toggle_cycle_settles_back_to_idle() {
    let registry = ActorRegistry::new();
    let actor = registry.spawn(run_machine(), "run-1", None).await.unwrap();

    assert!(actor.send(RunEvent::Toggle));
    assert_eq!(actor.snapshot().state, RunState::Running);

    assert!(actor.send(RunEvent::Toggle));
    assert_eq!(actor.snapshot().state, RunState::Stopping);

    // A premature Settle would be the effect's job; Toggle while stopping
    // is rejected
    assert!(!actor.send(RunEvent::Toggle));

    // The deferred Settle fires once the spin-down delay elapses
    tokio::time::sleep(Duration::from_secs(3)).await;
    let snapshot = actor.snapshot();
    assert_eq!(snapshot.state, RunState::Idle);
    assert_eq!(snapshot.context.cycles, 1);

    registry.stop_all().await;
    assert!(!actor.is_running());
}

/// One "client": its own actor, elector, and sync engine over the shared
/// store.
struct Client {
    actor: Arc<Actor<RunState, RunContext, RunEvent>>,
    elector: Arc<LeaderElector>,
    _sync: PersistenceSync<RunState, RunContext, RunEvent>,
}

impl Client {
    fn connect(store: &Arc<MemoryStore>, key: &str) -> Self {
        let actor = Actor::start(run_machine());
        let elector = Arc::new(LeaderElector::new(store.clone()));
        let sync = PersistenceSync::attach(
            &actor,
            store.clone() as Arc<dyn Storage>,
            elector.clone(),
            key,
            Duration::from_millis(100),
        );
        Self {
            actor,
            elector,
            _sync: sync,
        }
    }

    /// The focus handler's job: claim leadership for the shared key.
    async fn focus(&self, key: &str) {
        self.elector.claim(key).await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn leader_persists_follower_converges() {
    let store = Arc::new(MemoryStore::default());
    let tab_a = Client::connect(&store, "run");
    let tab_b = Client::connect(&store, "run");

    tab_a.focus("run").await;
    assert!(tab_a.elector.is_leader("run").await.unwrap());
    assert!(!tab_b.elector.is_leader("run").await.unwrap());

    // The leader drives the machine; its debounced writes reach the follower
    tab_a.actor.send(RunEvent::Toggle);
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(tab_a.actor.snapshot().state, RunState::Running);
    assert_eq!(tab_b.actor.snapshot().state, RunState::Running);
}

#[tokio::test(start_paused = true)]
async fn refocus_hands_leadership_over() {
    let store = Arc::new(MemoryStore::default());
    let tab_a = Client::connect(&store, "run");
    let tab_b = Client::connect(&store, "run");

    tab_a.focus("run").await;
    tab_a.actor.send(RunEvent::Toggle);
    tokio::time::sleep(Duration::from_millis(500)).await;

    // Tab B gains focus: the most recently focused client leads
    tab_b.focus("run").await;
    assert!(!tab_a.elector.is_leader("run").await.unwrap());
    assert!(tab_b.elector.is_leader("run").await.unwrap());

    // A's local changes no longer persist; B's do, and A converges to them
    tab_b.actor.send(RunEvent::Toggle);
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(tab_b.actor.snapshot().state, RunState::Stopping);
    assert_eq!(tab_a.actor.snapshot().state, RunState::Stopping);
}

#[tokio::test(start_paused = true)]
async fn graceful_release_lets_next_focus_take_over() {
    let store = Arc::new(MemoryStore::default());
    let tab_a = Client::connect(&store, "run");

    tab_a.focus("run").await;
    assert!(tab_a.elector.is_leader("run").await.unwrap());

    tab_a.elector.release("run").await.unwrap();
    assert!(!tab_a.elector.is_leader("run").await.unwrap());

    let tab_b = Client::connect(&store, "run");
    tab_b.focus("run").await;
    assert!(tab_b.elector.is_leader("run").await.unwrap());
}

struct FlakyTransport {
    failures_remaining: std::sync::atomic::AtomicU32,
    delivered: parking_lot::Mutex<Vec<Vec<String>>>,
}

#[async_trait::async_trait]
impl Transport for FlakyTransport {
    async fn send(&self, batch: &Batch) -> Result<(), TransportError> {
        use std::sync::atomic::Ordering;
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::new("connection reset"));
        }
        self.delivered.lock().push(batch.item_ids());
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn optimistic_marks_reconcile_through_batcher() {
    let transport = Arc::new(FlakyTransport {
        failures_remaining: std::sync::atomic::AtomicU32::new(1),
        delivered: parking_lot::Mutex::new(Vec::new()),
    });
    let config = StatekitConfig {
        batch_max_items: 3,
        ..StatekitConfig::default()
    };
    let batcher = CommandBatcher::start(transport.clone(), &config);
    let mut outcomes = batcher.subscribe_outcomes();

    // Application marks three items done optimistically
    for id in ["read-1", "read-2", "read-3"] {
        assert!(batcher.enqueue(CommandItem::new(id, json!({ "done": true }))));
    }

    // One transient failure, then the batch lands and the outcome confirms
    // every optimistic mark
    let outcome = outcomes.recv().await.unwrap();
    match outcome {
        BatchOutcome::Succeeded { item_ids } => {
            assert_eq!(item_ids, vec!["read-1", "read-2", "read-3"]);
        }
        BatchOutcome::Failed { error, .. } => panic!("unexpected failure: {error}"),
    }
    assert_eq!(transport.delivered.lock().len(), 1);
}

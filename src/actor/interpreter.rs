//! # Actor Interpreter
//!
//! Runtime interpreter for `MachineDefinition`s. Each actor serializes event
//! application behind a per-actor mutex, so two concurrent `send` calls can
//! never interleave a transition: the snapshot an observer receives is always
//! the one produced by a single, fully committed transition.

use crate::machine::{Effect, MachineDefinition, Snapshot, Transition};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Handle returned by `subscribe`, used to deregister the observer later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type SubscriberFn<S, C> = Box<dyn FnMut(&Snapshot<S, C>) + Send>;

struct ActorInner<S, C> {
    snapshot: Snapshot<S, C>,
    subscribers: Vec<(SubscriptionId, SubscriberFn<S, C>)>,
    next_subscription: u64,
}

/// A running instance of a `MachineDefinition`.
///
/// Subscribers are invoked synchronously while the actor's lock is held, so a
/// subscriber must not call back into the actor from inside the callback;
/// feedback into the machine goes through declared effects instead.
///
/// Effects are scheduled on the ambient Tokio runtime, so `send` must be
/// called from within one whenever the machine declares effects.
pub struct Actor<S, C, E> {
    definition: Arc<MachineDefinition<S, C, E>>,
    inner: Mutex<ActorInner<S, C>>,
    running: AtomicBool,
}

impl<S, C, E> Actor<S, C, E>
where
    S: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    /// Start a new actor at the definition's initial snapshot.
    pub fn start(definition: Arc<MachineDefinition<S, C, E>>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ActorInner {
                snapshot: definition.initial_snapshot(),
                subscribers: Vec::new(),
                next_subscription: 0,
            }),
            definition,
            running: AtomicBool::new(true),
        })
    }

    /// Identifier of the machine definition this actor interprets.
    pub fn machine_id(&self) -> &str {
        self.definition.id()
    }

    /// Whether the actor still accepts events.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Current snapshot. No side effects.
    pub fn snapshot(&self) -> Snapshot<S, C> {
        self.inner.lock().snapshot.clone()
    }

    /// Apply `event` to the current snapshot.
    ///
    /// Returns `true` if the transition changed the snapshot. A rejected
    /// event (not applicable in the current state) or a `send` after `stop`
    /// returns `false`, leaves the snapshot untouched, and notifies no one.
    pub fn send(self: &Arc<Self>, event: E) -> bool {
        if !self.is_running() {
            return false;
        }

        let effects = {
            let mut inner = self.inner.lock();
            // Re-check under the lock so a racing stop() wins
            if !self.is_running() {
                return false;
            }

            match self.definition.apply(&inner.snapshot, &event) {
                Transition::Unchanged => {
                    trace!(
                        machine_id = self.definition.id(),
                        "Event rejected in current state"
                    );
                    return false;
                }
                Transition::Next {
                    state,
                    context,
                    effects,
                } => {
                    inner.snapshot = Snapshot::new(state, context);
                    let snapshot = inner.snapshot.clone();
                    for (_, callback) in inner.subscribers.iter_mut() {
                        callback(&snapshot);
                    }
                    effects
                }
            }
        };

        for effect in effects {
            self.schedule_effect(effect);
        }
        true
    }

    /// Replace the snapshot out-of-band, bypassing the transition function.
    ///
    /// This is the trusted path used by persistence sync to apply an external
    /// snapshot into a follower. Subscribers are notified as for a normal
    /// transition; no effects run. No-op after `stop`.
    pub fn restore(&self, snapshot: Snapshot<S, C>) {
        if !self.is_running() {
            return;
        }
        let mut inner = self.inner.lock();
        if !self.is_running() {
            return;
        }
        inner.snapshot = snapshot;
        let snapshot = inner.snapshot.clone();
        for (_, callback) in inner.subscribers.iter_mut() {
            callback(&snapshot);
        }
    }

    /// Register an observer invoked with every committed snapshot, in
    /// subscription order.
    pub fn subscribe(
        &self,
        callback: impl FnMut(&Snapshot<S, C>) + Send + 'static,
    ) -> SubscriptionId {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        inner.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Deregister an observer. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner
            .lock()
            .subscribers
            .retain(|(existing, _)| *existing != id);
    }

    /// Mark the actor inert and drop all subscribers. Any later `send` or
    /// `restore` is a no-op; pending effect timers check liveness before
    /// delivering.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.inner.lock().subscribers.clear();
        debug!(machine_id = self.definition.id(), "Actor stopped");
    }

    fn schedule_effect(self: &Arc<Self>, effect: Effect<E>) {
        match effect {
            Effect::SendAfter { event, delay } => {
                let weak = Arc::downgrade(self);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(actor) = weak.upgrade() {
                        if actor.is_running() {
                            actor.send(event);
                        }
                    }
                });
            }
        }
    }
}

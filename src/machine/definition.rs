use super::snapshot::Snapshot;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Deferred action declared by a transition, executed after the snapshot
/// commit. Effects never block the transition itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect<E> {
    /// Deliver `event` back to the actor after `delay` (e.g. auto-close
    /// a garage door some time after it finished opening). The delivery
    /// is dropped if the actor has stopped in the meantime.
    SendAfter { event: E, delay: Duration },
}

/// Result of applying the transition function to a snapshot and an event.
///
/// `Unchanged` is the silent no-op case: the event does not apply in the
/// current state, the snapshot is left untouched, and subscribers are not
/// notified. It is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<S, C, E> {
    Next {
        state: S,
        context: C,
        effects: Vec<Effect<E>>,
    },
    Unchanged,
}

impl<S, C, E> Transition<S, C, E> {
    /// Commit a new state/context pair with no effects.
    pub fn next(state: S, context: C) -> Self {
        Self::Next {
            state,
            context,
            effects: Vec::new(),
        }
    }

    /// Reject the event: snapshot untouched, no notification.
    pub fn unchanged() -> Self {
        Self::Unchanged
    }

    /// Attach an effect to a committed transition. No-op on `Unchanged`.
    pub fn with_effect(mut self, effect: Effect<E>) -> Self {
        if let Self::Next { effects, .. } = &mut self {
            effects.push(effect);
        }
        self
    }

    /// Whether this transition changes the snapshot.
    pub fn changed(&self) -> bool {
        matches!(self, Self::Next { .. })
    }
}

type TransitionFn<S, C, E> = Arc<dyn Fn(&S, &C, &E) -> Transition<S, C, E> + Send + Sync>;

/// Static description of a state machine: identifier, initial snapshot, and
/// transition function. Immutable after creation; actors hold it behind an
/// `Arc` and never mutate it.
pub struct MachineDefinition<S, C, E> {
    id: String,
    initial: Snapshot<S, C>,
    transition: TransitionFn<S, C, E>,
}

impl<S, C, E> MachineDefinition<S, C, E>
where
    S: Clone,
    C: Clone,
{
    pub fn new(
        id: impl Into<String>,
        initial: Snapshot<S, C>,
        transition: impl Fn(&S, &C, &E) -> Transition<S, C, E> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            initial,
            transition: Arc::new(transition),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// A fresh copy of the initial snapshot.
    pub fn initial_snapshot(&self) -> Snapshot<S, C> {
        self.initial.clone()
    }

    /// Apply the transition function. Pure: no side effects, same inputs
    /// always produce the same transition.
    pub fn apply(&self, snapshot: &Snapshot<S, C>, event: &E) -> Transition<S, C, E> {
        (self.transition)(&snapshot.state, &snapshot.context, event)
    }
}

impl<S, C, E> fmt::Debug for MachineDefinition<S, C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineDefinition")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

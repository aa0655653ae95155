use serde::{Deserialize, Serialize};

/// Immutable pair of current state variant and context value.
///
/// A new snapshot replaces the old one atomically on each committed
/// transition; observers always see a state/context pair that was produced
/// together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot<S, C> {
    pub state: S,
    pub context: C,
}

impl<S, C> Snapshot<S, C> {
    pub fn new(state: S, context: C) -> Self {
        Self { state, context }
    }
}

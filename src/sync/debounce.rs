//! # Trailing-Edge Debouncer
//!
//! Coalesces rapid repeated triggers into one immediate flush and at most
//! one delayed follow-up per window.
//!
//! The debouncer is an explicit two-state machine driven by a dedicated
//! task: in `Idle`, the first trigger flushes immediately and opens a
//! window; triggers inside the window only set a pending flag; when the
//! window elapses with the flag set, exactly one trailing flush fires and
//! the window restarts. This bounds flush frequency to one per window while
//! guaranteeing the last trigger is always flushed.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Cloneable handle for requesting a flush. Sending is non-blocking and
/// never fails; triggers after cancellation are silently dropped.
#[derive(Clone)]
pub struct DebounceTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl DebounceTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

enum DebounceState {
    Idle,
    Window { pending: bool },
}

/// Debounced flush scheduler with a cancellable task handle.
pub struct Debouncer {
    tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Spawn the debounce task. `flush` runs on the ambient Tokio runtime
    /// once per committed flush; it is never run concurrently with itself.
    pub fn new<F, Fut>(window: Duration, flush: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(window, rx, flush));
        Self { tx, task }
    }

    /// Request a flush. First trigger in an idle period flushes immediately;
    /// triggers within the window coalesce into one trailing flush.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// A cloneable trigger handle for use from subscriber callbacks.
    pub fn handle(&self) -> DebounceTrigger {
        DebounceTrigger {
            tx: self.tx.clone(),
        }
    }

    /// Stop the debounce task. Pending trailing flushes are dropped.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<F, Fut>(window: Duration, mut rx: mpsc::UnboundedReceiver<()>, mut flush: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut state = DebounceState::Idle;
    let mut deadline = tokio::time::Instant::now();

    loop {
        match state {
            DebounceState::Idle => match rx.recv().await {
                Some(()) => {
                    flush().await;
                    deadline = tokio::time::Instant::now() + window;
                    state = DebounceState::Window { pending: false };
                }
                None => break,
            },
            DebounceState::Window { pending } => {
                tokio::select! {
                    trigger = rx.recv() => match trigger {
                        Some(()) => {
                            trace!("Trigger coalesced into pending flush");
                            state = DebounceState::Window { pending: true };
                        }
                        None => break,
                    },
                    () = tokio::time::sleep_until(deadline) => {
                        if pending {
                            flush().await;
                            deadline = tokio::time::Instant::now() + window;
                            state = DebounceState::Window { pending: false };
                        } else {
                            state = DebounceState::Idle;
                        }
                    }
                }
            }
        }
    }
}

//! The reorder dispatcher: the single actor that turns unordered worker
//! completions into submission-ordered emissions.
//!
//! Workers race freely, so completions arrive in arbitrary order. The
//! dispatcher buffers them and emits a result only when its key matches the
//! oldest outstanding submission (the ledger head). Because one task owns the
//! pending buffer and the ledger's removal path, the reorder logic itself
//! needs no locking; everything reaches it through the event channel.

use super::event::{Completion, Event};
use crate::OrderedSet;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Phases of the dispatcher.
enum DispatchState {
    /// Accepting completions and emitting whatever the ledger head allows.
    Draining,
    /// Finalize sentinel seen; the pool is joining in the background.
    ShuttingDown,
}

/// Serialized reconciliation loop.
///
/// Runs until the event channel closes, which can only happen once every
/// worker has exited (each worker owns a sender clone) and the broker handle
/// has released its own sender — so no completion can trail past this loop.
///
/// # Panics
///
/// Panics if any completion is left unmatched at shutdown: that means a
/// submitted job lost its submission slot, and silently dropping it would
/// corrupt the ordering guarantee downstream. Also panics if the ledger lock
/// was poisoned by a crashed submitter.
pub(crate) async fn dispatch_loop<K, R>(
    mut events: mpsc::Receiver<Event<K, R>>,
    ledger: OrderedSet<K>,
    output: mpsc::Sender<Completion<K, R>>,
    pool: TaskTracker,
) where
    K: Clone + PartialEq + Send + 'static,
    R: Send + 'static,
{
    let mut pending: Vec<Completion<K, R>> = Vec::new();
    let mut state = DispatchState::Draining;
    let mut pool_join: Option<JoinHandle<()>> = None;

    while let Some(event) = events.recv().await {
        match event {
            Event::Completed(done) => {
                pending.push(done);
                if !emit_ready(&ledger, &mut pending, &output).await {
                    // The results receiver is gone; nobody is left to
                    // deliver to, so reconciliation is moot.
                    return;
                }
            }
            Event::Finalize => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Finalize received; waiting for worker pool join");
                state = DispatchState::ShuttingDown;
                // Detached watcher: observes the counting join of the pool
                // without blocking this loop, which keeps consuming the
                // remaining in-flight completions meanwhile.
                let pool = pool.clone();
                pool_join = Some(tokio::spawn(async move { pool.wait().await }));
            }
        }
    }

    match state {
        DispatchState::ShuttingDown => {
            // The channel only closes after the last worker dropped its
            // sender, so the watcher is already done (or about to be).
            if let Some(join) = pool_join {
                let _ = join.await;
            }
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker pool joined; closing results stream");
        }
        DispatchState::Draining => {
            // Broker handle dropped without finalize. Intake closed the same
            // way, so the pool drained whatever was queued; treat it as an
            // implicit finalize.
            #[cfg(feature = "tracing")]
            tracing::debug!("Event channel closed without finalize sentinel");
        }
    }

    if !pending.is_empty() {
        #[cfg(feature = "tracing")]
        tracing::error!(
            unmatched = pending.len(),
            "dispatcher shutting down with unmatched results"
        );
        panic!(
            "reorder dispatcher shut down with {} unmatched result(s): a submitted job was never delivered",
            pending.len()
        );
    }

    // Dropping `output` here closes the results stream: the caller-visible
    // signal that every submitted result has been emitted.
}

/// Emits every completion currently unblocked at the head of the ledger.
///
/// A burst of completions can unblock several queued heads in a row, so this
/// keeps matching until the head has no buffered result yet. Emission removes
/// the job from both the ledger and the pending buffer.
///
/// Returns `false` when the output receiver was dropped and delivery should
/// be abandoned.
async fn emit_ready<K, R>(
    ledger: &OrderedSet<K>,
    pending: &mut Vec<Completion<K, R>>,
    output: &mpsc::Sender<Completion<K, R>>,
) -> bool
where
    K: Clone + PartialEq,
{
    while let Some(head) = ledger.first() {
        let Some(index) = pending.iter().position(|done| done.key == head) else {
            break;
        };
        let done = pending.remove(index);
        ledger.remove(&head);

        // Bounded send: a slow results consumer stalls here, which stalls
        // event consumption, which stalls the workers. That chain is the
        // intended backpressure, not a defect.
        if output.send(done).await.is_err() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Results receiver dropped; abandoning delivery");
            return false;
        }
    }
    true
}

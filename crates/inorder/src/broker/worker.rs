use super::event::{Completion, Event};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Worker task: pulls jobs off the shared intake and runs the callback.
///
/// Exactly one of these runs per unit of configured concurrency. Workers have
/// no per-job affinity: whichever worker is free takes the next intake item.
/// Each processed job produces exactly one [`Event::Completed`] on the
/// completion sink. The worker exits when the intake is closed and drained,
/// or when the dispatcher side of the sink is gone.
///
/// The callback is treated as an opaque, potentially slow, synchronous call,
/// so it runs on the blocking pool rather than on the async worker threads.
/// A callback that never returns stalls this worker; no timeout is enforced
/// here.
pub(crate) async fn worker_loop<K, R, F>(
    _worker_id: usize,
    intake: Arc<Mutex<mpsc::Receiver<K>>>,
    events: mpsc::Sender<Event<K, R>>,
    callback: Arc<F>,
) where
    K: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(K) -> R + Send + Sync + 'static,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {_worker_id} started");

    loop {
        // Hold the intake lock only while waiting for the next job: one
        // worker at a time parks on the shared receiver, the rest queue on
        // the lock.
        let job = { intake.lock().await.recv().await };
        let Some(job) = job else {
            // Intake closed and fully drained.
            break;
        };

        let key = job.clone();
        let run = Arc::clone(&callback);
        let result = match tokio::task::spawn_blocking(move || run(job)).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => {
                // The callback is assumed not to panic; if it does, resurface
                // the panic instead of silently dropping the job. The
                // dispatcher then reports the unmatched submission at
                // shutdown.
                std::panic::resume_unwind(err.into_panic());
            }
            Err(_) => break, // runtime shutting down
        };

        if events
            .send(Event::Completed(Completion { key, result }))
            .await
            .is_err()
        {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {_worker_id} exiting: dispatcher gone");
            break;
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {_worker_id} stopped");
}

//! The job broker: parallel execution, submission-order delivery.
//!
//! ## Responsibilities
//!
//! - Spawn and manage the fixed-size worker pool and the reorder dispatcher.
//! - Record every submission in the ordered ledger before it reaches a
//!   worker.
//! - Guard the caller contract: no duplicate in-flight keys, no submissions
//!   after finalize, one results stream, one finalize.
//! - Drive the shutdown protocol: close intake, deliver the finalize
//!   sentinel, and let the dispatcher close the stream once the pool joins.

mod config;
mod dispatch;
mod event;
#[cfg(test)]
mod tests;
mod worker;

pub use config::BrokerConfig;
pub use event::Completion;

use crate::{Error, OrderedSet, Result};
use dispatch::dispatch_loop;
use event::Event;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::task::TaskTracker;
use worker::worker_loop;

/// A bounded-concurrency job broker with submission-order result delivery.
///
/// Jobs are opaque keys of a caller-chosen type `K`; removal and matching are
/// by value equality, so `K` must implement [`PartialEq`]. The processing
/// callback maps each key to an `R`; it has no error channel of its own, so a
/// fallible callback should encode failure inside `R`.
///
/// Results appear on the stream returned by [`Self::results`] in exactly the
/// order jobs were submitted, regardless of which job finishes first. The
/// intake and output buffers are bounded, so submitters block while the
/// system is saturated and a slow result consumer slows the whole pipeline
/// down.
///
/// Once submitted, a job cannot be withdrawn: [`Self::finalize`] only stops
/// accepting new jobs, then closes the stream after every outstanding result
/// was emitted. Dropping the broker without finalizing behaves the same way,
/// minus the sentinel.
pub struct Broker<K, R> {
    concurrency: usize,
    intake_tx: Mutex<Option<mpsc::Sender<K>>>,
    events_tx: Mutex<Option<mpsc::Sender<Event<K, R>>>>,
    results_rx: Mutex<Option<mpsc::Receiver<Completion<K, R>>>>,
    ledger: OrderedSet<K>,
}

impl<K, R> Broker<K, R>
where
    K: Clone + PartialEq + Send + 'static,
    R: Send + 'static,
{
    /// Creates a broker with `concurrency` parallel workers and default
    /// buffer sizing (see [`BrokerConfig::new`]).
    ///
    /// The pool and the dispatcher start immediately; there is no lazy
    /// start.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if `concurrency` is zero.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn new<F>(concurrency: usize, callback: F) -> Result<Self>
    where
        F: Fn(K) -> R + Send + Sync + 'static,
    {
        Self::with_config(BrokerConfig::new(concurrency), callback)
    }

    /// Creates a broker from an explicit [`BrokerConfig`].
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if the config fails validation.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn with_config<F>(config: BrokerConfig, callback: F) -> Result<Self>
    where
        F: Fn(K) -> R + Send + Sync + 'static,
    {
        config.validate()?;

        let (intake_tx, intake_rx) = mpsc::channel(config.intake_capacity);
        // Near-rendezvous hand-off: a worker parks on send until the
        // dispatcher takes its event.
        let (events_tx, events_rx) = mpsc::channel(1);
        let (results_tx, results_rx) = mpsc::channel(config.output_capacity);
        let ledger = OrderedSet::with_capacity(config.intake_capacity);

        let callback = Arc::new(callback);
        let intake_rx = Arc::new(tokio::sync::Mutex::new(intake_rx));

        // Every worker owns a clone of `events_tx`; those clones dropping on
        // exit is what eventually closes the dispatcher input.
        let workers = TaskTracker::new();
        for worker_id in 0..config.concurrency {
            workers.spawn(worker_loop(
                worker_id,
                Arc::clone(&intake_rx),
                events_tx.clone(),
                Arc::clone(&callback),
            ));
        }
        workers.close();

        tokio::spawn(dispatch_loop(events_rx, ledger.clone(), results_tx, workers));

        Ok(Self {
            concurrency: config.concurrency,
            intake_tx: Mutex::new(Some(intake_tx)),
            events_tx: Mutex::new(Some(events_tx)),
            results_rx: Mutex::new(Some(results_rx)),
            ledger,
        })
    }

    /// Submits a job: records it in submission order and enqueues it for
    /// processing.
    ///
    /// Blocks (asynchronously) while the bounded intake is full — that is
    /// the producer-side backpressure.
    ///
    /// # Errors
    /// - [`Error::Finalized`] if [`Self::finalize`] was already called.
    /// - [`Error::DuplicateJob`] if an equal key is currently in flight; the
    ///   job is not enqueued and the ledger is untouched.
    /// - [`Error::LockPoisoned`] if the ledger lock was poisoned.
    pub async fn submit(&self, job: K) -> Result<()> {
        let intake = self.intake_tx.lock()?.clone().ok_or(Error::Finalized)?;

        // Check-and-record under one ledger lock acquisition so concurrent
        // submitters cannot race an equal key past the guard.
        if !self.ledger.try_push_unique(job.clone())? {
            return Err(Error::DuplicateJob);
        }

        if let Err(send_err) = intake.send(job).await {
            // Finalize raced us and the workers have already exited; undo
            // the ledger entry so shutdown does not report a lost job.
            let job = send_err.0;
            self.ledger.try_remove(&job)?;
            return Err(Error::Finalized);
        }

        Ok(())
    }

    /// Takes the single output stream of completed jobs.
    ///
    /// The stream yields [`Completion`]s in submission order and ends once
    /// the broker was finalized and every outstanding result was emitted.
    ///
    /// # Errors
    /// Returns [`Error::ResultsTaken`] on the second and subsequent calls.
    pub fn results(&self) -> Result<ReceiverStream<Completion<K, R>>> {
        let receiver = self.results_rx.lock()?.take().ok_or(Error::ResultsTaken)?;
        Ok(ReceiverStream::new(receiver))
    }

    /// One-shot shutdown trigger.
    ///
    /// Closes the job intake (jobs already submitted are still honored) and
    /// sends the finalize sentinel to the dispatcher. The results stream
    /// closes once the worker pool has joined and all results were emitted.
    ///
    /// # Errors
    /// Returns [`Error::Finalized`] if called more than once.
    pub async fn finalize(&self) -> Result<()> {
        // Dropping the broker-side intake sender closes intake for new work.
        let intake = self.intake_tx.lock()?.take();
        if intake.is_none() {
            return Err(Error::Finalized);
        }
        drop(intake);

        let Some(events) = self.events_tx.lock()?.take() else {
            return Err(Error::Finalized);
        };
        events
            .send(Event::Finalize)
            .await
            .map_err(|_| Error::Channel {
                context: "dispatcher exited before finalize".to_string(),
            })?;
        // `events` drops here: once the last worker exits, the dispatcher
        // input closes and the shutdown completes.
        Ok(())
    }

    /// Returns a point-in-time snapshot of the jobs still awaiting result
    /// delivery, in submission order.
    ///
    /// The snapshot is an independent deep copy; mutating it does not affect
    /// the broker, and the broker keeps running while it is inspected.
    ///
    /// # Errors
    /// Returns [`Error::LockPoisoned`] if the ledger lock was poisoned.
    pub fn pending_jobs(&self) -> Result<OrderedSet<K>> {
        self.ledger.try_duplicate()
    }

    /// The configured number of parallel workers.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

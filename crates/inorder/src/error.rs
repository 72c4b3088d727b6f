//! Error types for the job broker.
//!
//! This module defines the central [`Error`] enum covering every recoverable
//! failure the broker can report to callers.
//!
//! ## Error Cases
//! - `Channel`: an internal channel closed underneath an operation.
//! - `LockPoisoned`: a thread panicked while holding an [`OrderedSet`] lock.
//! - `InvalidConfig`: the broker was constructed with unusable parameters.
//! - `Finalized`: a submit or a second finalize arrived after [`finalize`].
//! - `DuplicateJob`: an equal key is already in flight.
//! - `ResultsTaken`: the single results stream was requested twice.
//!
//! A non-empty pending-result buffer at shutdown is deliberately *not* an
//! `Error`: it means a submitted job was never matched to its submission
//! slot, which is a broken internal invariant, and the dispatcher panics.
//!
//! [`OrderedSet`]: crate::OrderedSet
//! [`finalize`]: crate::Broker::finalize

use std::sync::{MutexGuard, PoisonError};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the job broker.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Internal channel send/receive failure (e.g., closed channel).
    #[error("channel error: {context}")]
    Channel { context: String },

    /// The operation failed due to a poisoned lock.
    ///
    /// This can happen if another thread panicked while holding a shared
    /// lock.
    #[error("lock poisoned")]
    LockPoisoned,

    /// The broker was constructed with invalid parameters.
    #[error("invalid broker config: {reason}")]
    InvalidConfig { reason: String },

    /// The broker no longer accepts work: `finalize` was already called.
    #[error("broker already finalized")]
    Finalized,

    /// A job with an equal key is already in flight.
    #[error("a job with an equal key is already in flight")]
    DuplicateJob,

    /// The results stream was already handed out.
    #[error("results stream already taken")]
    ResultsTaken,
}

// Convert all poisoned lock errors to a simplified `LockPoisoned`
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

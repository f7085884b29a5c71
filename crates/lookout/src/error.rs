//! Error types for table construction and the lookup worker pool.
//!
//! Every variant is fatal for the operation that produced it. Nothing in this
//! crate performs I/O, so there is nothing to retry against.
//!
//! ## Error Cases
//! - `Allocation`: the table could not reserve room for the requested pairs,
//!   or a pool could not allocate its per-worker bookkeeping.
//! - `Entropy`: the operating system could not seed a random generator.
//! - `InvalidConfig`: a pool was configured with zero workers, a zero yield
//!   interval, or a thread name prefix containing a NUL byte.
//! - `Spawn`: the operating system refused to create a worker thread.
//! - `WorkerFault`: a worker panicked while running its lookup loop.
//! - `LockPoisoned`: the pool's handle lock was poisoned.

/// A result type defaulting to [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `lookout` can produce.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Reserving capacity for the table or the pool's worker slots failed.
    ///
    /// No partial table is ever published and no worker is spawned when this
    /// happens.
    #[error("failed to reserve capacity for {requested} entries")]
    Allocation { requested: usize },

    /// The OS entropy source could not seed a generator.
    #[error("entropy source unavailable: {reason}")]
    Entropy { reason: String },

    /// The pool configuration was rejected before any worker started.
    #[error("invalid pool configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A worker thread could not be spawned.
    ///
    /// Workers spawned before the failure are cancelled and joined.
    #[error("failed to spawn worker {worker}: {reason}")]
    Spawn { worker: usize, reason: String },

    /// A worker terminated abnormally.
    ///
    /// Lookups cannot fail, so this always indicates a defect, usually in a
    /// caller-supplied observer.
    #[error("worker {worker} faulted: {reason}")]
    WorkerFault { worker: usize, reason: String },

    /// The operation failed due to a poisoned lock.
    ///
    /// Only reachable when the `parking-lot` feature is disabled.
    #[error("lock poisoned")]
    LockPoisoned,
}

#[cfg(not(feature = "parking-lot"))]
use std::sync::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
// Convert all poisoned lock errors to a simplified `LockPoisoned`
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

use crate::LookupStatus;

/// Receives the result of every lookup a worker performs.
///
/// One observer instance is shared by all workers of a pool, so it must be
/// `Send + Sync`. It is called on the hot path; keep it cheap.
///
/// Closures with the matching signature are observers:
///
/// ```
/// use lookout::{LookupStatus, Observer};
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// let hits = AtomicU64::new(0);
/// let observer = |_worker: usize, _key: u64, status: LookupStatus| {
///     if status.is_found() {
///         hits.fetch_add(1, Ordering::Relaxed);
///     }
/// };
/// observer.observe(0, 1, LookupStatus::Found { value: 2 });
/// assert_eq!(hits.load(Ordering::Relaxed), 1);
/// ```
///
/// A panic inside `observe` terminates the calling worker and is reported as
/// [`crate::Error::WorkerFault`] when the pool is joined.
pub trait Observer: Send + Sync {
    fn observe(&self, worker: usize, key: u64, status: LookupStatus);
}

impl<F> Observer for F
where
    F: Fn(usize, u64, LookupStatus) + Send + Sync,
{
    fn observe(&self, worker: usize, key: u64, status: LookupStatus) {
        self(worker, key, status);
    }
}

/// Discards every lookup result.
#[derive(Default, Clone, Copy, Debug)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    #[inline]
    fn observe(&self, _worker: usize, _key: u64, _status: LookupStatus) {}
}

/// Emits one `trace`-level event per lookup.
///
/// Extremely verbose; only meant for short diagnostic runs with
/// `RUST_LOG=trace`.
#[cfg(feature = "tracing")]
#[derive(Default, Clone, Copy, Debug)]
pub struct TraceObserver;

#[cfg(feature = "tracing")]
impl Observer for TraceObserver {
    fn observe(&self, worker: usize, key: u64, status: LookupStatus) {
        match status {
            LookupStatus::Found { value } => tracing::trace!(worker, key, value, "found"),
            LookupStatus::Missing => tracing::trace!(worker, key, "missing"),
        }
    }
}

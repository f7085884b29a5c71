use super::slot::LiveGuard;
use crate::{Observer, RandSource, SharedTable, WorkerState};
use std::{sync::Arc, thread};
use tokio_util::sync::CancellationToken;

/// Everything a single lookup worker owns.
///
/// Nothing here is shared with other workers except the read-only table, the
/// observer, and the cancellation token. The generator and counters are
/// private to the worker.
pub(crate) struct Worker<R, O: ?Sized> {
    pub(crate) index: usize,
    pub(crate) table: Arc<SharedTable>,
    pub(crate) rng: R,
    pub(crate) observer: Arc<O>,
    pub(crate) token: CancellationToken,
    pub(crate) guard: LiveGuard,
    pub(crate) yield_every: u64,
    pub(crate) max_iterations: Option<u64>,
}

impl<R, O> Worker<R, O>
where
    R: RandSource<u64>,
    O: Observer + ?Sized,
{
    /// Runs the lookup loop until cancelled or until the iteration bound is
    /// reached.
    ///
    /// Each iteration checks the cancellation token, draws a key from the
    /// private generator, probes the table, and hands the result to the
    /// observer. Every `yield_every` iterations the worker publishes its
    /// counters and yields to the scheduler.
    ///
    /// The [`LiveGuard`] is dropped when this returns (or unwinds), moving the
    /// slot to `Stopped`.
    pub(crate) fn run(self) {
        let Self {
            index,
            table,
            mut rng,
            observer,
            token,
            guard,
            yield_every,
            max_iterations,
        } = self;
        let slot = guard.slot();
        slot.advance_to(WorkerState::Running);

        #[cfg(feature = "tracing")]
        tracing::trace!(worker = index, "worker started");

        let limit = max_iterations.unwrap_or(u64::MAX);
        let mut iterations: u64 = 0;
        let mut hits: u64 = 0;

        while iterations < limit && !token.is_cancelled() {
            let key = rng.rand();
            let status = table.lookup(key);
            hits += u64::from(status.is_found());
            observer.observe(index, key, status);
            iterations += 1;

            if iterations % yield_every == 0 {
                slot.publish_counts(iterations, hits);
                #[cfg(feature = "tracing")]
                tracing::trace!(worker = index, iterations, hits, "yielding");
                thread::yield_now();
            }
        }

        slot.publish_counts(iterations, hits);
        slot.advance_to(WorkerState::Cancelling);

        #[cfg(feature = "tracing")]
        tracing::trace!(worker = index, iterations, hits, "worker stopped");
    }
}

use crate::{Error, Result, WorkerState};
use portable_atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[cfg(feature = "cache-padded")]
pub(crate) type Padded<T> = crossbeam_utils::CachePadded<T>;
#[cfg(not(feature = "cache-padded"))]
pub(crate) type Padded<T> = T;

#[cfg(feature = "cache-padded")]
fn pad<T>(value: T) -> Padded<T> {
    crossbeam_utils::CachePadded::new(value)
}

#[cfg(not(feature = "cache-padded"))]
const fn pad<T>(value: T) -> Padded<T> {
    value
}

/// Per-worker state visible to the pool.
///
/// Only the owning worker writes to a slot. Counters are flushed at yield
/// points and on exit, so they lag the worker's private counters until it
/// stops.
#[derive(Debug, Default)]
pub(crate) struct WorkerSlot {
    state: AtomicU8,
    iterations: AtomicU64,
    hits: AtomicU64,
}

impl WorkerSlot {
    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Walks the state machine forward to `target` one step at a time.
    /// Never moves backward, even when the pool signals cancellation
    /// concurrently.
    pub(crate) fn advance_to(&self, target: WorkerState) {
        let mut current = self.state();
        while current < target {
            let Some(next) = current.next() else {
                break;
            };
            match self.state.compare_exchange(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => current = next,
                Err(actual) => current = WorkerState::from_u8(actual),
            }
        }
    }

    /// `Running` becomes `Cancelling`; any other state is left alone.
    pub(crate) fn signal_cancel(&self) {
        let _ = self.state.compare_exchange(
            WorkerState::Running as u8,
            WorkerState::Cancelling as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub(crate) fn publish_counts(&self, iterations: u64, hits: u64) {
        self.iterations.store(iterations, Ordering::Relaxed);
        self.hits.store(hits, Ordering::Relaxed);
    }

    pub(crate) fn counts(&self) -> (u64, u64) {
        (
            self.iterations.load(Ordering::Relaxed),
            self.hits.load(Ordering::Relaxed),
        )
    }
}

/// State shared between a pool and its workers.
#[derive(Debug)]
pub(crate) struct Shared {
    slots: Box<[Padded<WorkerSlot>]>,
    live: Padded<AtomicUsize>,
}

impl Shared {
    /// Allocates one slot per worker, failing instead of aborting when the
    /// count is too large.
    pub(crate) fn try_new(num_workers: usize) -> Result<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(num_workers)
            .map_err(|_| Error::Allocation {
                requested: num_workers,
            })?;
        slots.extend((0..num_workers).map(|_| pad(WorkerSlot::default())));

        Ok(Self {
            slots: slots.into_boxed_slice(),
            live: pad(AtomicUsize::new(0)),
        })
    }

    pub(crate) fn slot(&self, index: usize) -> &WorkerSlot {
        &self.slots[index]
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Workers whose [`LiveGuard`] has not yet been dropped.
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

/// Counts a worker as live for as long as it exists.
///
/// The guard is created before the worker thread is spawned and moved into
/// it. Dropping it, whether on a normal exit, during a panic unwind, or
/// because the spawn itself failed, marks the slot `Stopped` and decrements
/// the live count.
#[derive(Debug)]
pub(crate) struct LiveGuard {
    shared: Arc<Shared>,
    index: usize,
}

impl LiveGuard {
    pub(crate) fn enter(shared: &Arc<Shared>, index: usize) -> Self {
        shared.live.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: Arc::clone(shared),
            index,
        }
    }

    pub(crate) fn slot(&self) -> &WorkerSlot {
        self.shared.slot(self.index)
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.slot().advance_to(WorkerState::Stopped);
        self.shared.live.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_never_moves_backward() {
        let slot = WorkerSlot::default();
        assert_eq!(slot.state(), WorkerState::Created);
        slot.advance_to(WorkerState::Cancelling);
        assert_eq!(slot.state(), WorkerState::Cancelling);
        slot.advance_to(WorkerState::Running);
        assert_eq!(slot.state(), WorkerState::Cancelling);
        slot.advance_to(WorkerState::Stopped);
        assert_eq!(slot.state(), WorkerState::Stopped);
    }

    #[test]
    fn cancel_signal_only_moves_running_slots() {
        let slot = WorkerSlot::default();
        slot.signal_cancel();
        assert_eq!(slot.state(), WorkerState::Created);

        slot.advance_to(WorkerState::Running);
        slot.signal_cancel();
        assert_eq!(slot.state(), WorkerState::Cancelling);

        slot.advance_to(WorkerState::Stopped);
        slot.signal_cancel();
        assert_eq!(slot.state(), WorkerState::Stopped);
    }

    #[test]
    fn oversized_slot_table_is_an_allocation_error() {
        let err = Shared::try_new(usize::MAX).unwrap_err();
        assert_eq!(
            err,
            Error::Allocation {
                requested: usize::MAX
            }
        );
    }

    #[test]
    fn guard_tracks_liveness_and_stops_slot() {
        let shared = Arc::new(Shared::try_new(2).unwrap());
        let a = LiveGuard::enter(&shared, 0);
        let b = LiveGuard::enter(&shared, 1);
        assert_eq!(shared.live(), 2);

        a.slot().advance_to(WorkerState::Running);
        drop(a);
        assert_eq!(shared.live(), 1);
        assert_eq!(shared.slot(0).state(), WorkerState::Stopped);
        assert_eq!(shared.slot(1).state(), WorkerState::Created);

        drop(b);
        assert_eq!(shared.live(), 0);
        assert_eq!(shared.slot(1).state(), WorkerState::Stopped);
    }
}

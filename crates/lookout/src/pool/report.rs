use crate::WorkerState;
use core::time::Duration;

/// What one worker did over its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WorkerReport {
    pub worker: usize,
    /// Lookups performed.
    pub iterations: u64,
    /// Lookups that found a value.
    pub hits: u64,
    pub state: WorkerState,
    /// Panic message, if the worker faulted.
    pub fault: Option<String>,
}

/// Aggregate view of a pool, taken at join time or on demand.
///
/// Counters of workers that are still running lag slightly behind; see
/// [`crate::WorkerPool::report`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolReport {
    pub workers: Vec<WorkerReport>,
    pub total_iterations: u64,
    pub total_hits: u64,
    /// Time since the pool started.
    pub elapsed: Duration,
}

impl PoolReport {
    pub(crate) fn new(workers: Vec<WorkerReport>, elapsed: Duration) -> Self {
        let total_iterations = workers.iter().map(|w| w.iterations).sum();
        let total_hits = workers.iter().map(|w| w.hits).sum();
        Self {
            workers,
            total_iterations,
            total_hits,
            elapsed,
        }
    }

    /// Workers that terminated with a fault.
    pub fn faults(&self) -> impl Iterator<Item = &WorkerReport> {
        self.workers.iter().filter(|w| w.fault.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.faults().next().is_none()
    }

    /// Aggregate lookup throughput over [`PoolReport::elapsed`].
    pub fn lookups_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.total_iterations as f64 / secs
        }
    }
}

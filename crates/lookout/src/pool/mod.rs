//! Thread pool of independent lookup workers.
//!
//! This module defines the [`WorkerPool`] struct, which spawns a fixed set of
//! OS threads that each repeatedly probe a published [`SharedTable`]. Workers
//! share nothing mutable: each owns its generator and counters, and all of
//! them watch a single [`CancellationToken`] for coordinated shutdown.
//!
//! Lifecycle:
//!
//! 1. Build a [`SharedTable`] and publish it into an [`Arc`].
//! 2. [`WorkerPool::start`] (or [`WorkerPool::start_with`]) spawns workers.
//! 3. [`WorkerPool::cancel`] signals every worker to stop.
//! 4. [`WorkerPool::join`] blocks until every worker thread has exited.

mod config;
mod report;
mod slot;
#[cfg(test)]
mod tests;
mod worker;

pub use config::*;
pub use report::*;

use crate::mutex::{Mutex, lock};
use crate::{
    Error, NoopObserver, Observer, OsRandom, RandSource, Result, SharedTable, WorkerState,
};
use core::{any::Any, time::Duration};
use slot::{LiveGuard, Shared};
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use worker::Worker;

/// A fixed-size pool of threads performing concurrent read-only lookups.
///
/// ## Features
///
/// - ✅ One OS thread per worker, no shared mutable state between workers
/// - ✅ Cooperative cancellation through a shared [`CancellationToken`]
/// - ✅ Join guarantees that no worker thread outlives the call
/// - ✅ Worker panics are caught at join and reported as
///   [`Error::WorkerFault`]
///
/// Dropping a pool cancels it but does not wait for its workers; call
/// [`WorkerPool::join`] or [`WorkerPool::shutdown`] for that.
///
/// # Example
/// ```
/// use lookout::{SharedTable, WorkerPool};
///
/// let table = SharedTable::from_pairs([(1, 100), (2, 200)]).publish();
/// let pool = WorkerPool::start(4, table).unwrap();
///
/// pool.cancel();
/// let report = pool.join().unwrap();
///
/// assert_eq!(pool.live_workers(), 0);
/// assert_eq!(report.workers.len(), 4);
/// ```
#[derive(Debug)]
pub struct WorkerPool {
    handles: Mutex<Vec<(usize, JoinHandle<()>)>>,
    faults: Mutex<Vec<(usize, String)>>,
    shared: Arc<Shared>,
    token: CancellationToken,
    started: Instant,
}

impl WorkerPool {
    /// Spawns `num_workers` workers over `table` with default settings.
    ///
    /// Each worker gets a private [`OsRandom`] seeded independently from OS
    /// entropy, and lookup results are discarded. Workers run until the pool
    /// is cancelled.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::start_with`].
    pub fn start(num_workers: usize, table: Arc<SharedTable>) -> Result<Self> {
        Self::start_with(
            PoolConfig::new(num_workers),
            table,
            |_| OsRandom::new(),
            Arc::new(NoopObserver),
        )
    }

    /// Spawns workers according to `config`.
    ///
    /// # Parameters
    ///
    /// - `config`: Worker count, yield interval, and optional iteration bound.
    /// - `table`: The published table. Workers only ever read it.
    /// - `rng_factory`: Called once per worker index, on the calling thread,
    ///   to build that worker's private generator. Inject deterministic
    ///   generators here for tests.
    /// - `observer`: Shared by all workers and invoked after every lookup.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `config` fails validation.
    /// - [`Error::Allocation`] if per-worker bookkeeping cannot be allocated.
    /// - Any error returned by `rng_factory`.
    /// - [`Error::Spawn`] if a thread cannot be created.
    ///
    /// On any error, workers already spawned are cancelled and joined before
    /// returning.
    pub fn start_with<R, F, O>(
        config: PoolConfig,
        table: Arc<SharedTable>,
        mut rng_factory: F,
        observer: Arc<O>,
    ) -> Result<Self>
    where
        R: RandSource<u64> + Send + 'static,
        F: FnMut(usize) -> Result<R>,
        O: Observer + ?Sized + 'static,
    {
        config.validate()?;

        let shared = Shared::try_new(config.num_workers)?;
        let mut handles = Vec::new();
        handles
            .try_reserve_exact(config.num_workers)
            .map_err(|_| Error::Allocation {
                requested: config.num_workers,
            })?;

        let pool = Self {
            handles: Mutex::new(handles),
            faults: Mutex::new(Vec::new()),
            shared: Arc::new(shared),
            token: CancellationToken::new(),
            started: Instant::now(),
        };

        for index in 0..config.num_workers {
            let spawned = pool.spawn_worker(index, &config, &table, &mut rng_factory, &observer);
            if let Err(e) = spawned {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to start worker {index}: {e}");
                pool.cancel();
                let _ = pool.join();
                return Err(e);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            workers = config.num_workers,
            yield_every = config.yield_every,
            max_iterations = ?config.max_iterations,
            entries = table.len(),
            "Worker pool started"
        );

        Ok(pool)
    }

    fn spawn_worker<R, F, O>(
        &self,
        index: usize,
        config: &PoolConfig,
        table: &Arc<SharedTable>,
        rng_factory: &mut F,
        observer: &Arc<O>,
    ) -> Result<()>
    where
        R: RandSource<u64> + Send + 'static,
        F: FnMut(usize) -> Result<R>,
        O: Observer + ?Sized + 'static,
    {
        let rng = rng_factory(index)?;
        let worker = Worker {
            index,
            table: Arc::clone(table),
            rng,
            observer: Arc::clone(observer),
            token: self.token.clone(),
            guard: LiveGuard::enter(&self.shared, index),
            yield_every: config.yield_every,
            max_iterations: config.max_iterations,
        };

        // If the spawn fails the closure is dropped unrun, and with it the
        // guard, so the live count stays accurate.
        let mut builder =
            thread::Builder::new().name(format!("{}-{index}", config.thread_name_prefix));
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }
        let handle = builder
            .spawn(move || worker.run())
            .map_err(|e| Error::Spawn {
                worker: index,
                reason: e.to_string(),
            })?;

        lock(&self.handles)?.push((index, handle));
        Ok(())
    }

    /// Signals every worker to stop. Idempotent and non-blocking.
    ///
    /// Running workers move to [`WorkerState::Cancelling`] immediately and to
    /// [`WorkerState::Stopped`] once they notice the signal and exit.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Cancelling worker pool");
            self.token.cancel();
        }
        for index in 0..self.shared.len() {
            self.shared.slot(index).signal_cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A clone of the pool's cancellation token.
    ///
    /// Cancelling the returned token cancels the pool, and async code can
    /// await [`CancellationToken::cancelled`] on it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Blocks until every worker thread has exited.
    ///
    /// Workers stop on their own only when an iteration bound is configured;
    /// otherwise call [`WorkerPool::cancel`] first (or use
    /// [`WorkerPool::shutdown`]). Concurrent callers are serialized, and once
    /// any call returns, no worker thread remains alive.
    ///
    /// # Errors
    ///
    /// - [`Error::WorkerFault`] for the first worker that panicked. All other
    ///   workers are still joined, and [`WorkerPool::report`] carries every
    ///   fault.
    /// - [`Error::LockPoisoned`] if an internal lock was poisoned.
    pub fn join(&self) -> Result<PoolReport> {
        {
            let mut handles = lock(&self.handles)?;
            let mut faults = Vec::new();
            for (index, handle) in handles.drain(..) {
                if let Err(payload) = handle.join() {
                    let reason = panic_message(payload.as_ref());
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {index} faulted: {reason}");
                    faults.push((index, reason));
                }
            }
            lock(&self.faults)?.extend(faults);
        }

        let report = self.report()?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            iterations = report.total_iterations,
            hits = report.total_hits,
            elapsed = ?report.elapsed,
            "Worker pool joined"
        );

        let fault = report.faults().next().map(|faulted| Error::WorkerFault {
            worker: faulted.worker,
            reason: faulted.fault.clone().unwrap_or_default(),
        });
        match fault {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Cancels the pool and joins every worker.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::join`].
    pub fn shutdown(&self) -> Result<PoolReport> {
        self.cancel();
        self.join()
    }

    /// Waits up to `timeout` for every worker to exit, without joining.
    ///
    /// Returns `true` if no worker is live anymore.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.live_workers() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// A snapshot of every worker's counters and state.
    ///
    /// Running workers publish their counters every `yield_every` lookups, so
    /// the snapshot lags them by at most that much. After
    /// [`WorkerPool::join`] the numbers are exact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockPoisoned`] if an internal lock was poisoned.
    pub fn report(&self) -> Result<PoolReport> {
        let faults = lock(&self.faults)?;
        let workers = (0..self.shared.len())
            .map(|index| {
                let slot = self.shared.slot(index);
                let (iterations, hits) = slot.counts();
                WorkerReport {
                    worker: index,
                    iterations,
                    hits,
                    state: self.state_of(index),
                    fault: faults
                        .iter()
                        .find(|(faulted, _)| *faulted == index)
                        .map(|(_, reason)| reason.clone()),
                }
            })
            .collect();
        Ok(PoolReport::new(workers, self.started.elapsed()))
    }

    pub fn num_workers(&self) -> usize {
        self.shared.len()
    }

    /// Number of workers that have not yet exited.
    pub fn live_workers(&self) -> usize {
        self.shared.live()
    }

    /// State of worker `index`, or `None` if out of range.
    pub fn worker_state(&self, index: usize) -> Option<WorkerState> {
        (index < self.shared.len()).then(|| self.state_of(index))
    }

    pub fn states(&self) -> Vec<WorkerState> {
        (0..self.shared.len())
            .map(|index| self.state_of(index))
            .collect()
    }

    // A token cancelled through a clone never passes through `cancel`, so a
    // slot can still read `Running` after the signal.
    fn state_of(&self, index: usize) -> WorkerState {
        let state = self.shared.slot(index).state();
        if state == WorkerState::Running && self.token.is_cancelled() {
            WorkerState::Cancelling
        } else {
            state
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked with a non-string payload".to_owned()
    }
}

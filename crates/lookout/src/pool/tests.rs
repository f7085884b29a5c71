use crate::{
    Error, LookupStatus, NoopObserver, PoolConfig, RandSource, Result, SeededRandom, SharedTable,
    WorkerPool, WorkerState,
};
use core::time::Duration;
use portable_atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

const WORKERS: usize = 4;

/// Replays a fixed list of keys forever.
struct CycleKeys {
    keys: Vec<u64>,
    next: usize,
}

impl CycleKeys {
    fn new(keys: Vec<u64>) -> Self {
        Self { keys, next: 0 }
    }
}

impl RandSource<u64> for CycleKeys {
    fn rand(&mut self) -> u64 {
        let key = self.keys[self.next];
        self.next = (self.next + 1) % self.keys.len();
        key
    }
}

/// Table holding every even key in `0..100`, with `value = key * 10`.
fn even_table() -> Arc<SharedTable> {
    SharedTable::from_pairs((0..100).step_by(2).map(|k| (k, k * 10))).publish()
}

fn wait_for_state(pool: &WorkerPool, state: WorkerState) {
    for _ in 0..5_000 {
        if pool.states().iter().all(|s| *s >= state) {
            return;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("workers never reached {state:?}: {:?}", pool.states());
}

#[test]
fn start_cancel_join_leaves_no_live_workers() {
    let table = SharedTable::from_pairs([(1, 100), (2, 200)]).publish();
    let pool = WorkerPool::start(WORKERS, table).unwrap();
    assert_eq!(pool.num_workers(), WORKERS);

    pool.cancel();
    let report = pool.join().unwrap();

    assert_eq!(pool.live_workers(), 0);
    assert!(pool.wait_idle(Duration::ZERO));
    assert!(report.is_clean());
    assert_eq!(report.workers.len(), WORKERS);
    assert!(
        pool.states().iter().all(|s| *s == WorkerState::Stopped),
        "{:?}",
        pool.states()
    );
}

#[test]
fn bounded_workers_stop_on_their_own() {
    const ITERATIONS: u64 = 50_000;

    let table = SharedTable::build_with(10_000, &mut SeededRandom::new(1))
        .unwrap()
        .publish();
    let config = PoolConfig::new(WORKERS)
        .with_yield_every(1_000)
        .with_max_iterations(ITERATIONS);
    let pool = WorkerPool::start_with(
        config,
        table,
        |worker| Ok(SeededRandom::for_worker(99, worker)),
        Arc::new(NoopObserver),
    )
    .unwrap();

    // No cancel: the iteration bound alone must end every worker.
    let report = pool.join().unwrap();

    assert!(!pool.is_cancelled());
    assert_eq!(pool.live_workers(), 0);
    assert_eq!(report.total_iterations, ITERATIONS * WORKERS as u64);
    for worker in &report.workers {
        assert_eq!(worker.iterations, ITERATIONS);
        assert_eq!(worker.state, WorkerState::Stopped);
        assert_eq!(worker.fault, None);
    }
}

#[test]
fn deterministic_generators_give_exact_hit_counts() {
    const ITERATIONS: u64 = 1_000;

    let found = Arc::new(AtomicU64::new(0));
    let wrong_value = Arc::new(AtomicU64::new(0));
    let observer = {
        let found = Arc::clone(&found);
        let wrong_value = Arc::clone(&wrong_value);
        move |_worker: usize, key: u64, status: LookupStatus| match status {
            LookupStatus::Found { value } => {
                found.fetch_add(1, Ordering::Relaxed);
                if value != key * 10 {
                    wrong_value.fetch_add(1, Ordering::Relaxed);
                }
            }
            LookupStatus::Missing => assert!(key % 2 == 1, "even key {key} missing"),
        }
    };

    let config = PoolConfig::new(WORKERS)
        .with_yield_every(7)
        .with_max_iterations(ITERATIONS);
    let pool = WorkerPool::start_with(
        config,
        even_table(),
        |_| Ok(CycleKeys::new((0..100).collect())),
        Arc::new(observer),
    )
    .unwrap();
    let report = pool.join().unwrap();

    // Half of the cycled keys are even, so half of all lookups hit.
    let expected_hits = ITERATIONS / 2 * WORKERS as u64;
    assert_eq!(report.total_hits, expected_hits);
    assert_eq!(found.load(Ordering::Relaxed), expected_hits);
    assert_eq!(wrong_value.load(Ordering::Relaxed), 0);
    for worker in &report.workers {
        assert_eq!(worker.hits, ITERATIONS / 2);
    }
}

#[test]
fn concurrent_lookups_never_observe_wrong_values() {
    let table = SharedTable::build_with(50_000, &mut SeededRandom::new(3)).unwrap();
    let keys: Arc<Vec<u64>> = Arc::new(table.iter().map(|(k, _)| k).collect());
    let table = table.publish();

    let mismatches = Arc::new(AtomicU64::new(0));
    let observer = {
        let table = Arc::clone(&table);
        let mismatches = Arc::clone(&mismatches);
        move |_worker: usize, key: u64, status: LookupStatus| {
            if status != table.lookup(key) || !status.is_found() {
                mismatches.fetch_add(1, Ordering::Relaxed);
            }
        }
    };

    let workers = num_cpus::get().clamp(2, 16);
    let config = PoolConfig::new(workers).with_max_iterations(20_000);
    let pool = WorkerPool::start_with(
        config,
        table,
        |worker| {
            let keys = keys.iter().copied().skip(worker).step_by(3).collect();
            Ok(CycleKeys::new(keys))
        },
        Arc::new(observer),
    )
    .unwrap();
    let report = pool.join().unwrap();

    assert_eq!(mismatches.load(Ordering::Relaxed), 0);
    assert_eq!(report.total_hits, report.total_iterations);
}

#[test]
fn cancellation_stops_unbounded_workers() {
    let config = PoolConfig::new(WORKERS).with_yield_every(64);
    let pool = WorkerPool::start_with(
        config,
        even_table(),
        |worker| Ok(SeededRandom::for_worker(5, worker)),
        Arc::new(NoopObserver),
    )
    .unwrap();

    wait_for_state(&pool, WorkerState::Running);
    assert_eq!(pool.live_workers(), WORKERS);

    let report = pool.shutdown().unwrap();
    assert_eq!(pool.live_workers(), 0);
    assert!(pool.is_cancelled());
    assert!(report.workers.iter().all(|w| w.state == WorkerState::Stopped));
}

/// Observer that parks every worker inside `observe` until released.
fn gate_observer(release: Arc<AtomicBool>) -> impl Fn(usize, u64, LookupStatus) {
    move |_worker: usize, _key: u64, _status: LookupStatus| {
        while !release.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

#[test]
fn cancel_moves_running_workers_to_cancelling() {
    let release = Arc::new(AtomicBool::new(false));
    let pool = WorkerPool::start_with(
        PoolConfig::new(2),
        even_table(),
        |worker| Ok(SeededRandom::for_worker(6, worker)),
        Arc::new(gate_observer(Arc::clone(&release))),
    )
    .unwrap();
    wait_for_state(&pool, WorkerState::Running);

    pool.cancel();
    assert_eq!(pool.states(), [WorkerState::Cancelling; 2]);
    assert_eq!(pool.worker_state(1), Some(WorkerState::Cancelling));
    assert_eq!(pool.live_workers(), 2);

    release.store(true, Ordering::Release);
    let report = pool.join().unwrap();
    assert!(report.workers.iter().all(|w| w.state == WorkerState::Stopped));
    assert_eq!(pool.states(), [WorkerState::Stopped; 2]);
}

#[test]
fn cancelled_token_clone_reports_cancelling() {
    let release = Arc::new(AtomicBool::new(false));
    let pool = WorkerPool::start_with(
        PoolConfig::new(2),
        even_table(),
        |worker| Ok(SeededRandom::for_worker(7, worker)),
        Arc::new(gate_observer(Arc::clone(&release))),
    )
    .unwrap();
    wait_for_state(&pool, WorkerState::Running);

    pool.token().cancel();
    assert_eq!(pool.states(), [WorkerState::Cancelling; 2]);

    release.store(true, Ordering::Release);
    pool.join().unwrap();
    assert_eq!(pool.states(), [WorkerState::Stopped; 2]);
}

#[test]
fn cancelling_the_token_cancels_the_pool() {
    let pool = WorkerPool::start(2, even_table()).unwrap();
    pool.token().cancel();

    assert!(pool.is_cancelled());
    assert!(pool.wait_idle(Duration::from_secs(10)));
    pool.join().unwrap();
}

#[test]
fn panicking_observer_is_reported_as_fault() {
    let observer = |worker: usize, _key: u64, _status: LookupStatus| {
        if worker == 2 {
            panic!("observer exploded");
        }
    };

    let config = PoolConfig::new(WORKERS).with_max_iterations(10_000);
    let pool = WorkerPool::start_with(
        config,
        even_table(),
        |worker| Ok(SeededRandom::for_worker(0, worker)),
        Arc::new(observer),
    )
    .unwrap();

    let err = pool.join().unwrap_err();
    assert_eq!(
        err,
        Error::WorkerFault {
            worker: 2,
            reason: "observer exploded".to_owned()
        }
    );
    assert_eq!(pool.live_workers(), 0);

    let report = pool.report().unwrap();
    assert!(!report.is_clean());
    let faulted: Vec<usize> = report.faults().map(|w| w.worker).collect();
    assert_eq!(faulted, [2]);
    assert_eq!(report.workers[2].state, WorkerState::Stopped);
    for worker in [0, 1, 3] {
        assert_eq!(report.workers[worker].iterations, 10_000);
    }
}

#[test]
fn invalid_config_is_rejected() {
    let zero_workers = WorkerPool::start(0, even_table()).unwrap_err();
    assert!(matches!(zero_workers, Error::InvalidConfig { .. }));

    let zero_yield = WorkerPool::start_with(
        PoolConfig::new(2).with_yield_every(0),
        even_table(),
        |_| Ok(SeededRandom::new(0)),
        Arc::new(NoopObserver),
    )
    .unwrap_err();
    assert!(matches!(zero_yield, Error::InvalidConfig { .. }));

    let nul_prefix = PoolConfig::new(2).with_thread_name_prefix("bad\0name");
    assert!(matches!(
        nul_prefix.validate(),
        Err(Error::InvalidConfig { .. })
    ));
    let table = even_table();
    let err = WorkerPool::start_with(
        nul_prefix,
        Arc::clone(&table),
        |_| Ok(SeededRandom::new(0)),
        Arc::new(NoopObserver),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));
    assert_eq!(Arc::strong_count(&table), 1);
}

#[test]
fn absurd_worker_count_is_an_allocation_error() {
    let err = WorkerPool::start(usize::MAX, even_table()).unwrap_err();
    assert!(matches!(err, Error::Allocation { .. }));
}

// No address space can back a 1 EiB stack, so the OS refuses the thread.
#[cfg(all(target_os = "linux", target_env = "gnu", target_pointer_width = "64"))]
#[test]
fn spawn_failure_releases_everything() {
    let table = even_table();
    let err = WorkerPool::start_with(
        PoolConfig::new(WORKERS).with_stack_size(1 << 60),
        Arc::clone(&table),
        |worker| Ok(SeededRandom::for_worker(2, worker)),
        Arc::new(NoopObserver),
    )
    .unwrap_err();

    assert!(matches!(err, Error::Spawn { worker: 0, .. }), "{err:?}");
    assert_eq!(Arc::strong_count(&table), 1);
}

#[test]
fn generator_failure_aborts_start() {
    let table = even_table();
    let factory = |worker: usize| -> Result<SeededRandom> {
        if worker == 2 {
            Err(Error::Entropy {
                reason: "no entropy for you".to_owned(),
            })
        } else {
            Ok(SeededRandom::for_worker(1, worker))
        }
    };

    let err = WorkerPool::start_with(
        PoolConfig::new(WORKERS),
        Arc::clone(&table),
        factory,
        Arc::new(NoopObserver),
    )
    .unwrap_err();

    assert!(matches!(err, Error::Entropy { .. }));
    // The two workers that did start were joined and released the table.
    assert_eq!(Arc::strong_count(&table), 1);
}

#[test]
fn join_is_repeatable() {
    let config = PoolConfig::new(2).with_max_iterations(500);
    let pool = WorkerPool::start_with(
        config,
        even_table(),
        |worker| Ok(SeededRandom::for_worker(8, worker)),
        Arc::new(NoopObserver),
    )
    .unwrap();

    let first = pool.join().unwrap();
    let second = pool.join().unwrap();
    assert_eq!(first.total_iterations, 1_000);
    assert_eq!(first.workers, second.workers);
}

#[test]
fn worker_state_out_of_range_is_none() {
    let pool = WorkerPool::start(1, even_table()).unwrap();
    assert!(pool.worker_state(0).is_some());
    assert_eq!(pool.worker_state(1), None);
    pool.shutdown().unwrap();
    assert_eq!(pool.worker_state(0), Some(WorkerState::Stopped));
}

#[test]
fn dropping_a_pool_cancels_it() {
    let pool = WorkerPool::start(2, even_table()).unwrap();
    let token = pool.token();
    drop(pool);
    assert!(token.is_cancelled());
}

#[cfg(feature = "serde")]
#[test]
fn report_serializes_to_json() {
    let config = PoolConfig::new(2).with_max_iterations(10);
    let pool = WorkerPool::start_with(
        config,
        even_table(),
        |_| Ok(CycleKeys::new(vec![0, 1])),
        Arc::new(NoopObserver),
    )
    .unwrap();
    let report = pool.join().unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["total_iterations"], 20);
    assert_eq!(json["total_hits"], 10);
    assert_eq!(json["workers"][0]["state"], "Stopped");
}

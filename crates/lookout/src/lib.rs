//! A read-only `u64 -> u64` table that is built once, published, and then
//! probed concurrently by a fixed pool of cancellable lookup workers.
//!
//! ```
//! use lookout::{LookupStatus, NoopObserver, PoolConfig, SeededRandom, SharedTable, WorkerPool};
//! use std::sync::Arc;
//!
//! let table = SharedTable::from_pairs([(1, 100), (2, 200)]).publish();
//! assert_eq!(table.lookup(1), LookupStatus::Found { value: 100 });
//! assert_eq!(table.lookup(3), LookupStatus::Missing);
//!
//! let config = PoolConfig::new(4).with_max_iterations(1_000);
//! let pool = WorkerPool::start_with(
//!     config,
//!     table,
//!     |worker| Ok(SeededRandom::for_worker(7, worker)),
//!     Arc::new(NoopObserver),
//! )
//! .unwrap();
//!
//! let report = pool.shutdown().unwrap();
//! assert_eq!(pool.live_workers(), 0);
//! assert!(report.total_iterations <= 4_000);
//! ```
mod error;
mod mutex;
mod observer;
mod pool;
mod rand;
mod status;
mod table;

pub use crate::error::*;
pub use crate::observer::*;
pub use crate::pool::*;
pub use crate::rand::*;
pub use crate::status::*;
pub use crate::table::*;

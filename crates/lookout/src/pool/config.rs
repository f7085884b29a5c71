use crate::{Error, Result};

/// Lookups between cooperative yields when no interval is configured.
pub const DEFAULT_YIELD_EVERY: u64 = 10_000;

/// Prefix for worker thread names; the worker index is appended.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "lookout-worker";

/// Settings for a [`crate::WorkerPool`].
///
/// # Example
/// ```
/// use lookout::PoolConfig;
///
/// let config = PoolConfig::new(8)
///     .with_yield_every(1_000)
///     .with_max_iterations(1_000_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads. Must be greater than zero.
    pub num_workers: usize,
    /// Each worker yields to the scheduler after this many lookups. Must be
    /// greater than zero.
    pub yield_every: u64,
    /// Per-worker lookup bound. `None` runs until the pool is cancelled.
    pub max_iterations: Option<u64>,
    /// Worker threads are named `{prefix}-{index}`. Must not contain NUL
    /// bytes.
    pub thread_name_prefix: String,
    /// Stack size for worker threads in bytes. `None` uses the platform
    /// default.
    pub stack_size: Option<usize>,
}

impl PoolConfig {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            yield_every: DEFAULT_YIELD_EVERY,
            max_iterations: None,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_owned(),
            stack_size: None,
        }
    }

    #[must_use]
    pub const fn with_yield_every(mut self, yield_every: u64) -> Self {
        self.yield_every = yield_every;
        self
    }

    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    #[must_use]
    pub const fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Rejects configurations that could never run a lookup loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `num_workers` or `yield_every` is
    /// zero, or if `thread_name_prefix` contains a NUL byte.
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(Error::InvalidConfig {
                reason: "num_workers must be greater than 0".to_owned(),
            });
        }
        if self.yield_every == 0 {
            return Err(Error::InvalidConfig {
                reason: "yield_every must be greater than 0".to_owned(),
            });
        }
        if self.thread_name_prefix.contains('\0') {
            return Err(Error::InvalidConfig {
                reason: "thread_name_prefix must not contain NUL bytes".to_owned(),
            });
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(1)
    }
}

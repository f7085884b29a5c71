use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use lookout::PoolConfig;

/// Runtime configuration for the `lookout` binary.
///
/// These settings control the size of the lookup table, the number of worker
/// threads probing it, and how the run ends. All values are parsed from CLI
/// arguments or environment variables (a `.env` file is honoured), with
/// defaults matching the classic demonstration: 250 000 pairs probed by 10
/// workers until interrupted.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "lookout",
    version,
    about = "Probe a shared read-only table from a pool of worker threads"
)]
pub struct CliArgs {
    /// Number of random key/value pairs inserted into the table.
    ///
    /// Keys are drawn from the full 64-bit range, so duplicates are possible
    /// but rare; the table may end up with slightly fewer distinct keys.
    ///
    /// Environment variable: `NUM_PAIRS`
    #[arg(long, env = "NUM_PAIRS", default_value_t = 250_000)]
    pub pairs: usize,

    /// Number of worker threads probing the table concurrently.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 10)]
    pub workers: usize,

    /// Each worker yields to the scheduler after this many lookups.
    ///
    /// Environment variable: `YIELD_EVERY`
    #[arg(long, env = "YIELD_EVERY", default_value_t = lookout::DEFAULT_YIELD_EVERY)]
    pub yield_every: u64,

    /// Stop each worker after this many lookups. Unbounded if unset.
    ///
    /// Environment variable: `MAX_ITERATIONS`
    #[arg(long, env = "MAX_ITERATIONS")]
    pub max_iterations: Option<u64>,

    /// Stop the run after this many seconds. Runs until Ctrl+C if unset.
    ///
    /// Environment variable: `RUN_DURATION_SECS`
    #[arg(long, env = "RUN_DURATION_SECS")]
    pub duration_secs: Option<u64>,

    /// How long to wait for workers to exit after cancellation before
    /// giving up with an error.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Emit a trace event for every lookup (needs `RUST_LOG=trace`).
    #[arg(long, default_value_t = false)]
    pub log_lookups: bool,

    /// Print the final report as JSON on stdout.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub pairs: usize,
    pub pool: PoolConfig,
    pub duration: Option<Duration>,
    pub shutdown_timeout: Duration,
    pub log_lookups: bool,
    pub json: bool,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.yield_every == 0 {
            bail!("YIELD_EVERY must be greater than 0");
        }

        if args.shutdown_timeout_secs == 0 {
            bail!("SHUTDOWN_TIMEOUT_SECS must be greater than 0");
        }

        let mut pool = PoolConfig::new(args.workers).with_yield_every(args.yield_every);
        if let Some(max_iterations) = args.max_iterations {
            pool = pool.with_max_iterations(max_iterations);
        }

        Ok(Self {
            pairs: args.pairs,
            pool,
            duration: args.duration_secs.map(Duration::from_secs),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
            log_lookups: args.log_lookups,
            json: args.json,
        })
    }
}

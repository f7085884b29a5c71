//! Log output for the `lookout` binary.
//!
//! Events from both the binary and the `lookout` library are printed to
//! stderr through `tracing_subscriber::fmt`. Verbosity follows `RUST_LOG`
//! and defaults to `info`:
//!
//! - `info`: startup, table publication, pool start/join, shutdown.
//! - `debug`: table build progress, cancellation.
//! - `trace`: worker start/stop and yield points, plus every lookup when
//!   `--log-lookups` is set.
//!
//! ```bash
//! RUST_LOG=debug cargo run --bin lookout -- --workers 4 --duration-secs 5
//! ```

use anyhow::Context;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_names(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        )
        .try_init()
        .context("failed to install tracing subscriber")
}

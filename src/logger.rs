//! Logging setup for the specrebase binary
//!
//! Library code only emits `tracing` events; the subscriber is installed
//! once by the CLI before any command runs.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global tracing subscriber.
///
/// `--verbose` wins over `--quiet`. Without either flag `RUST_LOG` is
/// honoured, falling back to info level for this crate.
pub fn init_logger(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("specrebase=debug")
    } else if quiet {
        EnvFilter::new("specrebase=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("specrebase=info"))
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .compact();

    // A second call (e.g. from tests driving `cli::run` twice) must not panic
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

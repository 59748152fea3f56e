//! Structured logging setup.
//!
//! Logs go to stderr so stdout stays reserved for the CSV report.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "accrual_engine=info";

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default filter.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

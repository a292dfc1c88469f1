//! Logging setup shared by the binaries.
//!
//! `RUST_LOG` wins when set; otherwise the level is INFO, or DEBUG with `--verbose`.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Structured JSON logs for the in-cluster services
pub fn init_json(verbose: bool) {
    FmtSubscriber::builder()
        .with_env_filter(filter(verbose))
        .json()
        .init();
}

/// Human readable logs for the workstation tool
pub fn init_console(verbose: bool) {
    FmtSubscriber::builder()
        .with_env_filter(filter(verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

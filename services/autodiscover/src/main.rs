//! Cluster Directory
//!
//! Accepts heartbeats from member clusters and serves the live member list.
//! State is in memory only; a restart starts from an empty directory and
//! refills within one heartbeat period.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use cluster_autodiscover::config::DirectoryArgs;
use cluster_autodiscover::{create_router, shutdown, telemetry, AppState, Registry};

#[tokio::main]
async fn main() -> Result<()> {
    let args = DirectoryArgs::parse();
    telemetry::init_json(args.verbose);

    let registry = Arc::new(Registry::new(args.ttl()));
    let app = create_router(AppState::new(registry, &args.token));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        ttl_secs = args.ttl_secs,
        "Starting cluster directory on {}",
        args.listen
    );

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await?;

    info!("Cluster directory stopped");
    Ok(())
}

//! Kubeconfig Sync
//!
//! Fetches the directory listing once and reconciles it into the operator's
//! kubeconfig. Exits non-zero on any failure.

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

use cluster_autodiscover::config::SyncArgs;
use cluster_autodiscover::{telemetry, DiscoveryClient, FileConfigStore, Reconciler};

#[tokio::main]
async fn main() -> Result<()> {
    let args = SyncArgs::parse();
    telemetry::init_console(args.verbose);

    let store = FileConfigStore::discover(args.kubeconfig.clone())?;
    let directory = DiscoveryClient::new(&args.api, &args.token, args.timeout())?;
    let reconciler = Reconciler::new(args.policy());

    debug!(
        directory = %directory.base_url(),
        kubeconfig = %store.path().display(),
        "Syncing autodiscovered clusters"
    );

    let report = reconciler
        .sync(&directory, &store, args.email.as_deref(), args.dry_run)
        .await?;

    for name in &report.added {
        info!("Added cluster {}", name);
    }
    for name in &report.updated {
        info!("Updated cluster {}", name);
    }
    for name in &report.removed {
        info!("Removed cluster {}", name);
    }
    for name in &report.skipped {
        info!("Skipped {} (outside {})", name, reconciler.policy().cluster_prefix);
    }
    if report.identity_created {
        info!("Created user {}", report.identity);
    }

    Ok(())
}

//! Cluster Poster
//!
//! Runs in each member cluster and announces it to the directory every
//! interval until the pod is stopped.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use cluster_autodiscover::config::PosterArgs;
use cluster_autodiscover::{shutdown, telemetry, Member, Poster};

#[tokio::main]
async fn main() -> Result<()> {
    let args = PosterArgs::parse();
    telemetry::init_json(args.verbose);

    let ca_pem = std::fs::read_to_string(&args.ca_file)
        .with_context(|| format!("failed to read cluster CA from {}", args.ca_file.display()))?;

    let member = Member::new(&args.cluster, &args.external_url, ca_pem);
    let poster = Poster::new(&args.api, &args.token, member, args.interval())?;

    let cancel = shutdown::cancel_on_signal();
    poster.run(cancel).await;

    info!("Cluster poster stopped");
    Ok(())
}

//! Command line and environment configuration for the three binaries

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::discovery::{DEFAULT_DIRECTORY_URL, DEFAULT_TIMEOUT_SECS};
use crate::poster::{DEFAULT_CA_FILE, DEFAULT_POST_INTERVAL_SECS};
use crate::reconciler::{
    AuthProviderTemplate, ReconcilePolicy, DEFAULT_CLUSTER_PREFIX, DEFAULT_IDENTITY_SUFFIX,
};
use crate::registry::DEFAULT_MEMBER_TTL_SECS;

/// Longest accepted member TTL, one year
pub const MAX_MEMBER_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Version line including build metadata when it was supplied at build time
pub fn long_version() -> &'static str {
    static LONG_VERSION: OnceLock<String> = OnceLock::new();
    LONG_VERSION.get_or_init(|| {
        format!(
            "{} (git sha: {}, built: {})",
            env!("CARGO_PKG_VERSION"),
            option_env!("AUTODISCOVER_GIT_SHA").unwrap_or("unknown"),
            option_env!("AUTODISCOVER_BUILD_TIME").unwrap_or("unknown"),
        )
    })
}

/// Cluster directory - in-memory registry of live clusters
#[derive(Parser, Debug)]
#[command(name = "directory", version, long_version = long_version(), about)]
pub struct DirectoryArgs {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:9000", env = "LISTEN_ADDR")]
    pub listen: SocketAddr,

    /// Shared token clients must present
    #[arg(long, env = "AUTODISCOVER_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Seconds a member stays listed after its last heartbeat
    #[arg(
        long,
        default_value_t = DEFAULT_MEMBER_TTL_SECS,
        env = "MEMBER_TTL_SECS",
        value_parser = clap::value_parser!(i64).range(1..=MAX_MEMBER_TTL_SECS)
    )]
    pub ttl_secs: i64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl DirectoryArgs {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs)
    }
}

/// Cluster poster - announces this cluster to the directory
#[derive(Parser, Debug)]
#[command(name = "poster", version, long_version = long_version(), about)]
pub struct PosterArgs {
    /// Name this cluster is announced under
    #[arg(long, env = "CLUSTER_NAME")]
    pub cluster: String,

    /// Externally reachable API server URL
    #[arg(long, env = "EXTERNAL_URL")]
    pub external_url: String,

    /// Directory endpoint
    #[arg(long, default_value = DEFAULT_DIRECTORY_URL, env = "API")]
    pub api: String,

    /// Shared directory token
    #[arg(long, env = "AUTODISCOVER_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Cluster CA certificate to announce
    #[arg(long, default_value = DEFAULT_CA_FILE, env = "CA_FILE")]
    pub ca_file: PathBuf,

    /// Seconds between heartbeats
    #[arg(
        long,
        default_value_t = DEFAULT_POST_INTERVAL_SECS,
        env = "POST_INTERVAL_SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl PosterArgs {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Sync autodiscovered clusters into your kubeconfig
#[derive(Parser, Debug)]
#[command(name = "kubesync", version, long_version = long_version(), about)]
pub struct SyncArgs {
    /// Email used for Kubernetes auth when no matching user exists yet
    #[arg(long, env = "BINK_KUBE_EMAIL")]
    pub email: Option<String>,

    /// Directory endpoint
    #[arg(long, default_value = DEFAULT_DIRECTORY_URL, env = "AUTODISCOVER_URL")]
    pub api: String,

    /// Shared directory token
    #[arg(long, env = "AUTODISCOVER_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Kubeconfig to update (default: first entry of KUBECONFIG, then ~/.kube/config)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Directory request timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Only clusters and contexts with this prefix are managed
    #[arg(long, default_value = DEFAULT_CLUSTER_PREFIX)]
    pub cluster_prefix: String,

    /// Users with this suffix are candidates for new contexts
    #[arg(long, default_value = DEFAULT_IDENTITY_SUFFIX)]
    pub identity_suffix: String,

    /// Compute changes without writing the kubeconfig
    #[arg(long, default_value = "false")]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl SyncArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn policy(&self) -> ReconcilePolicy {
        ReconcilePolicy {
            cluster_prefix: self.cluster_prefix.clone(),
            identity_suffix: self.identity_suffix.clone(),
            auth_template: AuthProviderTemplate::azure(),
        }
    }
}

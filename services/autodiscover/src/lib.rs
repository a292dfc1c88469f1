//! Cluster Autodiscover
//!
//! Lets member clusters announce themselves to a central directory and lets
//! operators fold the directory listing into their local kubeconfig.
//!
//! - `directory` binary: TTL registry behind an authenticated HTTP API
//! - `poster` binary: in-cluster heartbeat loop
//! - `kubesync` binary: fetches the listing and reconciles the kubeconfig

pub mod api;
pub mod config;
pub mod discovery;
pub mod error;
pub mod kubeconfig;
pub mod member;
pub mod poster;
pub mod reconciler;
pub mod registry;
pub mod shutdown;
pub mod telemetry;

pub use api::{create_router, AppState};
pub use discovery::{DiscoveryClient, MemberDirectory, StaticDirectory};
pub use error::{AutodiscoverError, Result};
pub use kubeconfig::{ConfigStore, FileConfigStore, Kubeconfig, MemoryConfigStore};
pub use member::Member;
pub use poster::Poster;
pub use reconciler::{ReconcilePolicy, ReconcileReport, Reconciler};
pub use registry::Registry;

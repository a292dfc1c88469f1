//! Kubeconfig Reconciler
//!
//! Syncs the set of discovered clusters into a kubeconfig. Each run is a
//! complete, independent attempt: load the store, diff it against the
//! discovered members in memory, and write it back once if anything changed.
//!
//! ## Ownership
//!
//! Only entries whose name starts with the managed prefix are owned. Owned
//! clusters and contexts are created, updated and removed to match the
//! directory; everything else in the file is left exactly as it was. An empty
//! directory listing therefore removes every owned entry and nothing else.
//!
//! ## Credential identity
//!
//! New contexts are bound to the operator's user entry, found by a name
//! suffix convention. When there is no such user the operator has to name one
//! explicitly; the reconciler never guesses which human gets cluster access.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::discovery::MemberDirectory;
use crate::error::{AutodiscoverError, Result};
use crate::kubeconfig::{AuthProviderConfig, Cluster, ConfigStore, Context, Kubeconfig, User};
use crate::member::Member;

/// Name prefix of clusters and contexts managed by the reconciler
pub const DEFAULT_CLUSTER_PREFIX: &str = "uksouth-";

/// Name suffix identifying the operator's user entry
pub const DEFAULT_IDENTITY_SUFFIX: &str = "@bink.com";

/// Namespace given to newly created contexts
pub const DEFAULT_NAMESPACE: &str = "default";

/// Auth provider settings written for a newly created user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthProviderTemplate {
    pub name: String,
    pub config: BTreeMap<String, String>,
}

impl AuthProviderTemplate {
    /// Azure AD login against the platform's AKS server application
    pub fn azure() -> Self {
        let config = [
            ("client-id", "aeb43981-c317-4f08-97be-aeed19f91cb1"),
            ("environment", "AzurePublicCloud"),
            ("apiserver-id", "d250be93-618a-45e5-b9cf-6a156f536a00"),
            ("tenant-id", "a6e2367a-92ea-4e5a-b565-723830bcc095"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            name: "azure".to_string(),
            config,
        }
    }

    fn to_user(&self) -> User {
        User {
            auth_provider: Some(AuthProviderConfig {
                name: self.name.clone(),
                config: self.config.clone(),
            }),
            ..Default::default()
        }
    }
}

/// Naming conventions the reconciler works under
#[derive(Debug, Clone)]
pub struct ReconcilePolicy {
    pub cluster_prefix: String,
    pub identity_suffix: String,
    pub auth_template: AuthProviderTemplate,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            cluster_prefix: DEFAULT_CLUSTER_PREFIX.to_string(),
            identity_suffix: DEFAULT_IDENTITY_SUFFIX.to_string(),
            auth_template: AuthProviderTemplate::azure(),
        }
    }
}

impl ReconcilePolicy {
    /// Ownership predicate: only owned entries may be created, changed or removed.
    pub fn owns(&self, name: &str) -> bool {
        name.starts_with(&self.cluster_prefix)
    }
}

/// The user entry new contexts are bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub name: String,
    /// Whether the entry has to be created from the template
    pub create: bool,
}

/// What a reconciliation run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub identity: String,
    pub identity_created: bool,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub contexts_added: Vec<String>,
    pub contexts_removed: Vec<String>,
    /// Discovered members outside the managed prefix
    pub skipped: Vec<String>,
    pub changed: bool,
}

pub struct Reconciler {
    policy: ReconcilePolicy,
}

impl Reconciler {
    pub fn new(policy: ReconcilePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// Pick the user entry to bind new contexts to.
    ///
    /// Exactly one user matching the suffix is used as is. With none, the
    /// operator supplied name is used (and created if absent). With several,
    /// the operator supplied name must be one of them.
    pub fn resolve_identity(
        &self,
        config: &Kubeconfig,
        operator_identity: Option<&str>,
    ) -> Result<ResolvedIdentity> {
        let suffix = self.policy.identity_suffix.as_str();
        let operator_identity = operator_identity.map(str::trim).filter(|s| !s.is_empty());

        let mut matches: Vec<&str> = config
            .user_names()
            .filter(|name| name.ends_with(suffix))
            .collect();
        matches.dedup();

        match (matches.as_slice(), operator_identity) {
            ([only], _) => Ok(ResolvedIdentity {
                name: only.to_string(),
                create: false,
            }),
            ([], Some(supplied)) => Ok(ResolvedIdentity {
                name: supplied.to_string(),
                create: config.user(supplied).is_none(),
            }),
            ([], None) => Err(AutodiscoverError::MissingIdentity {
                suffix: suffix.to_string(),
            }),
            (many, Some(supplied)) if many.contains(&supplied) => Ok(ResolvedIdentity {
                name: supplied.to_string(),
                create: false,
            }),
            (many, _) => Err(AutodiscoverError::AmbiguousIdentity {
                suffix: suffix.to_string(),
                candidates: many.join(", "),
            }),
        }
    }

    /// Apply the discovered member set to `config` in memory.
    ///
    /// Nothing is mutated when identity resolution fails.
    pub fn reconcile(
        &self,
        discovered: &[Member],
        config: &mut Kubeconfig,
        operator_identity: Option<&str>,
    ) -> Result<ReconcileReport> {
        let identity = self.resolve_identity(config, operator_identity)?;
        let mut report = ReconcileReport {
            identity: identity.name.clone(),
            ..Default::default()
        };

        if identity.create {
            config.insert_user(&identity.name, self.policy.auth_template.to_user());
            info!(user = %identity.name, "Added user");
            report.identity_created = true;
        }

        // Later duplicates win, like later heartbeats do in the directory
        let mut wanted: BTreeMap<&str, &Member> = BTreeMap::new();
        for member in discovered {
            if self.policy.owns(&member.name) {
                wanted.insert(member.name.as_str(), member);
            } else {
                warn!(
                    cluster = %member.name,
                    "Ignoring discovered cluster outside the managed prefix"
                );
                report.skipped.push(member.name.clone());
            }
        }

        let stale_clusters: Vec<String> = config
            .cluster_names()
            .filter(|name| self.policy.owns(name) && !wanted.contains_key(name))
            .map(str::to_string)
            .collect();
        for name in stale_clusters {
            if config.remove_cluster(&name) {
                info!(cluster = %name, "Removing cluster");
                report.removed.push(name);
            }
        }

        let stale_contexts: Vec<String> = config
            .context_names()
            .filter(|name| self.policy.owns(name) && !wanted.contains_key(name))
            .map(str::to_string)
            .collect();
        for name in stale_contexts {
            if config.remove_context(&name) {
                info!(context = %name, "Removing context");
                report.contexts_removed.push(name);
            }
        }

        for (name, member) in wanted {
            match config.cluster_mut(name) {
                None => {
                    info!(cluster = %name, url = %member.url, "Adding cluster");
                    config.insert_cluster(name, Cluster::new(&member.url, member.ca_bytes()));
                    report.added.push(name.to_string());
                }
                Some(cluster) => {
                    let mut updated = false;

                    if cluster.server.as_deref() != Some(member.url.as_str()) {
                        info!(cluster = %name, url = %member.url, "Updating cluster URL");
                        cluster.server = Some(member.url.clone());
                        updated = true;
                    }

                    if cluster.certificate_authority().as_deref() != Some(member.ca_bytes()) {
                        info!(cluster = %name, "Updating cluster CA");
                        cluster.set_certificate_authority(member.ca_bytes());
                        updated = true;
                    }

                    if updated {
                        report.updated.push(name.to_string());
                    } else {
                        debug!(cluster = %name, "Cluster unchanged");
                    }
                }
            }

            if config.context(name).is_none() {
                info!(context = %name, user = %identity.name, "Adding context");
                config.insert_context(
                    name,
                    Context {
                        cluster: name.to_string(),
                        user: identity.name.clone(),
                        namespace: Some(DEFAULT_NAMESPACE.to_string()),
                        ..Default::default()
                    },
                );
                report.contexts_added.push(name.to_string());
            }
        }

        report.changed = report.identity_created
            || !report.added.is_empty()
            || !report.updated.is_empty()
            || !report.removed.is_empty()
            || !report.contexts_added.is_empty()
            || !report.contexts_removed.is_empty();

        Ok(report)
    }

    /// Load the store, reconcile, and write back once if anything changed.
    ///
    /// Load, write and identity failures abort the run before anything is
    /// persisted. A failed write is not retried.
    pub fn run(
        &self,
        discovered: &[Member],
        store: &dyn ConfigStore,
        operator_identity: Option<&str>,
        dry_run: bool,
    ) -> Result<ReconcileReport> {
        let mut config = store.load()?;
        let report = self.reconcile(discovered, &mut config, operator_identity)?;

        if !report.changed {
            info!(kubeconfig = %store.location(), "Kubernetes config unchanged");
        } else if dry_run {
            info!(kubeconfig = %store.location(), "Dry run, Kubernetes config not written");
        } else {
            store.save(&config)?;
            info!(kubeconfig = %store.location(), "Kubernetes config updated");
        }

        Ok(report)
    }

    /// Fetch the directory listing and run a reconciliation against it.
    pub async fn sync(
        &self,
        directory: &dyn MemberDirectory,
        store: &dyn ConfigStore,
        operator_identity: Option<&str>,
        dry_run: bool,
    ) -> Result<ReconcileReport> {
        let discovered = directory.list_members().await?;
        self.run(&discovered, store, operator_identity, dry_run)
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconcilePolicy::default())
    }
}

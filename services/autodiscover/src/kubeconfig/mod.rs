//! Kubeconfig Store
//!
//! A narrow model of the kubeconfig document plus the `ConfigStore` seam the
//! reconciler works through.
//!
//! Only the fields the reconciler reads or writes are typed. Everything else
//! (preferences, current-context, exec plugins, tokens, extensions) is kept in
//! `extra` maps and written back verbatim, so saving is a merge rather than a
//! rewrite of the operator's file.

mod file;
mod memory;

pub use file::FileConfigStore;
pub use memory::MemoryConfigStore;

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

type Extra = BTreeMap<String, serde_yaml::Value>;

/// Persisted cluster/context/user configuration, loaded and saved whole.
pub trait ConfigStore: Send + Sync {
    /// Load the full document. A store with nothing persisted yet returns an
    /// empty kubeconfig.
    fn load(&self) -> Result<Kubeconfig>;

    /// Replace the persisted document with `config` in one write.
    fn save(&self, config: &Kubeconfig) -> Result<()>;

    /// Human readable location, for logs
    fn location(&self) -> String;
}

/// A kubeconfig document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kubeconfig {
    #[serde(rename = "apiVersion", default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clusters: Vec<NamedCluster>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contexts: Vec<NamedContext>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<NamedUser>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    #[serde(default)]
    pub cluster: Cluster,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Base64 of the PEM trust anchor
    #[serde(
        rename = "certificate-authority-data",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_authority_data: Option<String>,
    #[serde(
        rename = "insecure-skip-tls-verify",
        default,
        skip_serializing_if = "is_false"
    )]
    pub insecure_skip_tls_verify: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Cluster {
    /// Cluster pointing at `server` and trusting `ca`, with TLS verification on.
    pub fn new(server: &str, ca: &[u8]) -> Self {
        let mut cluster = Self {
            server: Some(server.to_string()),
            ..Default::default()
        };
        cluster.set_certificate_authority(ca);
        cluster
    }

    /// Decoded trust anchor. `None` when absent or not valid base64.
    pub fn certificate_authority(&self) -> Option<Vec<u8>> {
        self.certificate_authority_data
            .as_deref()
            .and_then(|data| base64::engine::general_purpose::STANDARD.decode(data).ok())
    }

    pub fn set_certificate_authority(&mut self, ca: &[u8]) {
        self.certificate_authority_data =
            Some(base64::engine::general_purpose::STANDARD.encode(ca));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    #[serde(default)]
    pub context: Context,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedUser {
    pub name: String,
    #[serde(default)]
    pub user: User,
}

/// Credential identity (`users[].user`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(
        rename = "auth-provider",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub auth_provider: Option<AuthProviderConfig>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthProviderConfig {
    pub name: String,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

impl Kubeconfig {
    /// An empty `v1` config, what kubectl starts from when no file exists.
    pub fn empty() -> Self {
        Self {
            api_version: Some("v1".to_string()),
            kind: Some("Config".to_string()),
            ..Default::default()
        }
    }

    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::empty());
        }
        serde_yaml::from_str(text)
    }

    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn cluster_names(&self) -> impl Iterator<Item = &str> {
        self.clusters.iter().map(|c| c.name.as_str())
    }

    pub fn context_names(&self) -> impl Iterator<Item = &str> {
        self.contexts.iter().map(|c| c.name.as_str())
    }

    pub fn user_names(&self) -> impl Iterator<Item = &str> {
        self.users.iter().map(|u| u.name.as_str())
    }

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name).map(|c| &c.cluster)
    }

    pub fn cluster_mut(&mut self, name: &str) -> Option<&mut Cluster> {
        self.clusters
            .iter_mut()
            .find(|c| c.name == name)
            .map(|c| &mut c.cluster)
    }

    pub fn context(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name == name).map(|c| &c.context)
    }

    pub fn user(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name).map(|u| &u.user)
    }

    pub fn insert_cluster(&mut self, name: &str, cluster: Cluster) {
        self.clusters.push(NamedCluster {
            name: name.to_string(),
            cluster,
        });
    }

    pub fn insert_context(&mut self, name: &str, context: Context) {
        self.contexts.push(NamedContext {
            name: name.to_string(),
            context,
        });
    }

    pub fn insert_user(&mut self, name: &str, user: User) {
        self.users.push(NamedUser {
            name: name.to_string(),
            user,
        });
    }

    /// Remove a cluster by name, returning whether it existed.
    pub fn remove_cluster(&mut self, name: &str) -> bool {
        let before = self.clusters.len();
        self.clusters.retain(|c| c.name != name);
        self.clusters.len() != before
    }

    /// Remove a context by name, returning whether it existed.
    pub fn remove_context(&mut self, name: &str) -> bool {
        let before = self.contexts.len();
        self.contexts.retain(|c| c.name != name);
        self.contexts.len() != before
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

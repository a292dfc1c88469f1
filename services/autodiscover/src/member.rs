//! Member records
//!
//! The wire shape shared by the poster (heartbeat body), the directory
//! (listing body) and the kubeconfig sync (discovery input).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cluster announcing itself to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Unique cluster name, used as the key everywhere
    #[serde(rename = "cluster")]
    pub name: String,
    /// External API server URL
    pub url: String,
    /// PEM-encoded cluster CA certificate
    #[serde(rename = "ca")]
    pub ca_pem: String,
}

impl Member {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        ca_pem: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ca_pem: ca_pem.into(),
        }
    }

    /// Trust anchor as raw bytes, the form stored in a kubeconfig.
    pub fn ca_bytes(&self) -> &[u8] {
        self.ca_pem.as_bytes()
    }
}

/// A member as held by the registry, stamped with its last heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredMember {
    pub member: Member,
    pub last_heartbeat: DateTime<Utc>,
}

impl RegisteredMember {
    /// Live iff `last_heartbeat + ttl > now`. An expiry past the end of
    /// representable time never arrives.
    pub fn is_live(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        match self.last_heartbeat.checked_add_signed(ttl) {
            Some(expires) => expires > now,
            None => true,
        }
    }
}

//! Directory Discovery Client
//!
//! Fetches the live member list from the directory's listing endpoint.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{AutodiscoverError, Result};
use crate::member::Member;

/// Default directory endpoint
pub const DEFAULT_DIRECTORY_URL: &str = "https://cluster-autodiscover.uksouth.bink.sh";

/// Default request timeout for directory calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Source of discovered members
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// Currently live members. Malformed records are dropped, not fatal.
    async fn list_members(&self) -> Result<Vec<Member>>;
}

/// HTTP client for the directory API
pub struct DiscoveryClient {
    http_client: Client,
    base_url: String,
    token: String,
}

impl DiscoveryClient {
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl MemberDirectory for DiscoveryClient {
    async fn list_members(&self) -> Result<Vec<Member>> {
        let url = format!("{}/", self.base_url);
        debug!(url = %url, "Fetching directory listing");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AutodiscoverError::Directory {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        let members = decode_members(&body)?;

        info!(count = members.len(), "Autodiscovered clusters");
        Ok(members)
    }
}

/// Decode a listing body.
///
/// The body must be a JSON array; each element is decoded on its own and
/// elements that are not valid member records, or that have an empty name or
/// URL, are skipped with a warning so one bad entry cannot block the rest.
pub fn decode_members(body: &[u8]) -> Result<Vec<Member>> {
    let records: Vec<serde_json::Value> = serde_json::from_slice(body)
        .map_err(|e| AutodiscoverError::Decode(format!("listing is not a JSON array: {}", e)))?;

    let mut members = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match decode_member(record) {
            Ok(member) => members.push(member),
            Err(e) => warn!(index, error = %e, "Skipping malformed directory record"),
        }
    }

    Ok(members)
}

fn decode_member(record: serde_json::Value) -> Result<Member> {
    let member: Member =
        serde_json::from_value(record).map_err(|e| AutodiscoverError::Decode(e.to_string()))?;

    if member.name.trim().is_empty() {
        return Err(AutodiscoverError::Decode("empty cluster name".to_string()));
    }
    if member.url.trim().is_empty() {
        return Err(AutodiscoverError::Decode(format!(
            "cluster {} has no url",
            member.name
        )));
    }

    Ok(member)
}

/// Fixed member list, for tests and offline runs
pub struct StaticDirectory(pub Vec<Member>);

#[async_trait]
impl MemberDirectory for StaticDirectory {
    async fn list_members(&self) -> Result<Vec<Member>> {
        Ok(self.0.clone())
    }
}

//! Heartbeat Poster
//!
//! Runs inside a member cluster and announces it to the directory on a fixed
//! interval, forever. Failures are logged and the next attempt happens on the
//! next tick; there is no backoff growth and no retry cap.

use reqwest::Client;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{AutodiscoverError, Result};
use crate::member::Member;

/// Default heartbeat period
pub const DEFAULT_POST_INTERVAL_SECS: u64 = 5 * 60;

/// Default in-cluster CA bundle
pub const DEFAULT_CA_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

pub struct Poster {
    http_client: Client,
    directory_url: String,
    token: String,
    member: Member,
    period: Duration,
}

impl Poster {
    pub fn new(
        directory_url: &str,
        token: impl Into<String>,
        member: Member,
        period: Duration,
    ) -> Result<Self> {
        if period.is_zero() {
            return Err(AutodiscoverError::Config(
                "heartbeat period must be non-zero".to_string(),
            ));
        }

        // A hung request must not stall the schedule
        let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            http_client,
            directory_url: directory_url.to_string(),
            token: token.into(),
            member,
            period,
        })
    }

    pub fn member(&self) -> &Member {
        &self.member
    }

    /// Send one heartbeat, returning the response status.
    pub async fn post_once(&self) -> Result<u16> {
        let response = self
            .http_client
            .post(&self.directory_url)
            .bearer_auth(&self.token)
            .json(&self.member)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(AutodiscoverError::Directory {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// Heartbeat until `cancel` fires. The first heartbeat is sent immediately.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            directory = %self.directory_url,
            cluster = %self.member.name,
            period_secs = self.period.as_secs(),
            "Sending cluster info to directory"
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Poster shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.post_once().await {
                Ok(status) => info!(status, "Posted heartbeat"),
                Err(e) => error!(error = %e, "Failed to post heartbeat"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_returns_when_cancelled() {
        let poster = Poster::new(
            // Nothing listens here; failures are logged and the loop carries on
            "http://127.0.0.1:9/",
            "t",
            Member::new("uksouth-a", "https://a", "ca"),
            Duration::from_secs(3600),
        )
        .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), poster.run(cancel))
            .await
            .expect("poster should stop once cancelled");
    }

    #[tokio::test]
    async fn test_post_once_reports_transport_errors() {
        let poster = Poster::new(
            "http://127.0.0.1:9/",
            "t",
            Member::new("uksouth-a", "https://a", "ca"),
            Duration::from_secs(3600),
        )
        .unwrap();

        let err = poster.post_once().await.unwrap_err();
        assert!(matches!(err, AutodiscoverError::Transport(_)));
    }

    #[test]
    fn test_zero_period_is_rejected() {
        let result = Poster::new(
            "http://127.0.0.1:9/",
            "t",
            Member::new("uksouth-a", "https://a", "ca"),
            Duration::ZERO,
        );

        assert!(matches!(result, Err(AutodiscoverError::Config(_))));
    }
}

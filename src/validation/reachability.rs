use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

use super::ReachabilityChecker;

/// Considers a URL reachable when it answers with a 2xx or 3xx status.
pub struct HttpReachabilityChecker {
    client: reqwest::Client,
}

impl HttpReachabilityChecker {
    pub fn new(timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("failed to build reachability client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ReachabilityChecker for HttpReachabilityChecker {
    async fn is_reachable(&self, url: &str) -> Result<bool> {
        let mut status = self.client.head(url).send().await?.status();

        // Some servers refuse HEAD outright
        if status == StatusCode::METHOD_NOT_ALLOWED {
            status = self.client.get(url).send().await?.status();
        }

        debug!(url, status = status.as_u16(), "reachability probe");
        Ok(status.is_success() || status.is_redirection())
    }
}

//! Google Safe Browsing v4 Lookup API client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::SafetyChecker;

const THREAT_TYPES: [&str; 4] = [
    "MALWARE",
    "SOCIAL_ENGINEERING",
    "UNWANTED_SOFTWARE",
    "POTENTIALLY_HARMFUL_APPLICATION",
];

pub struct SafeBrowsingChecker {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FindRequest<'a> {
    client: ClientInfo,
    threat_info: ThreatInfo<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientInfo {
    client_id: &'static str,
    client_version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreatInfo<'a> {
    threat_types: &'a [&'a str],
    platform_types: &'a [&'a str],
    threat_entry_types: &'a [&'a str],
    threat_entries: Vec<ThreatEntry<'a>>,
}

#[derive(Serialize)]
struct ThreatEntry<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct FindResponse {
    #[serde(default)]
    matches: Vec<serde_json::Value>,
}

impl SafeBrowsingChecker {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build Safe Browsing client")?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v4/threatMatches:find?key={}",
                base_url.trim_end_matches('/'),
                api_key
            ),
        })
    }
}

#[async_trait]
impl SafetyChecker for SafeBrowsingChecker {
    async fn is_safe(&self, url: &str) -> Result<bool> {
        let request = FindRequest {
            client: ClientInfo {
                client_id: env!("CARGO_PKG_NAME"),
                client_version: env!("CARGO_PKG_VERSION"),
            },
            threat_info: ThreatInfo {
                threat_types: &THREAT_TYPES,
                platform_types: &["ANY_PLATFORM"],
                threat_entry_types: &["URL"],
                threat_entries: vec![ThreatEntry { url }],
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .context("Safe Browsing request failed")?
            .error_for_status()
            .context("Safe Browsing returned an error status")?;

        let body: FindResponse = response
            .json()
            .await
            .context("invalid Safe Browsing response")?;

        Ok(body.matches.is_empty())
    }
}

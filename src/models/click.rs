use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Visitor details attached to a click.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickProperties {
    pub ip: Option<String>,
    pub browser: String,
    pub platform: String,
}

/// A single visit to a short key. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickRecord {
    pub hash: String,
    pub created: DateTime<Utc>,
    pub properties: ClickProperties,
}

impl ClickRecord {
    pub fn new(hash: impl Into<String>, properties: ClickProperties) -> Self {
        Self {
            hash: hash.into(),
            created: Utc::now(),
            properties,
        }
    }
}

/// Per-key click totals broken down by browser and platform label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickStats {
    pub total: i64,
    pub browsers: BTreeMap<String, i64>,
    pub platforms: BTreeMap<String, i64>,
}

impl ClickStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ClickRecord>) -> Self {
        let mut stats = ClickStats::default();
        for record in records {
            stats.total += 1;
            *stats
                .browsers
                .entry(record.properties.browser.clone())
                .or_default() += 1;
            *stats
                .platforms
                .entry(record.properties.platform.clone())
                .or_default() += 1;
        }
        stats
    }
}

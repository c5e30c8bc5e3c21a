//! Click logging
//!
//! Logging a click never fails and never blocks the redirect decision: the
//! production logger hands records to a background writer over a bounded
//! channel and drops them (with a warning) when the channel is full.

pub mod buffered;

pub use buffered::BufferedClickLogger;

use dashmap::DashMap;

use crate::models::{ClickProperties, ClickRecord};

pub trait ClickLogger: Send + Sync {
    fn log(&self, key: &str, properties: ClickProperties);
}

/// Keeps clicks in memory, keyed by short key.
#[derive(Default)]
pub struct MemoryClickLogger {
    records: DashMap<String, Vec<ClickRecord>>,
}

impl MemoryClickLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self, key: &str) -> Vec<ClickRecord> {
        self.records
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

impl ClickLogger for MemoryClickLogger {
    fn log(&self, key: &str, properties: ClickProperties) {
        self.records
            .entry(key.to_string())
            .or_default()
            .push(ClickRecord::new(key, properties));
    }
}

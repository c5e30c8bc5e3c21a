use crate::models::{ClickRecord, ClickStats, ShortUrlMapping, ValidationStatus};
use crate::storage::{ShortUrlStore, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// In-memory store used by tests and local experiments.
#[derive(Default)]
pub struct MemoryStorage {
    urls: DashMap<String, ShortUrlMapping>,
    clicks: DashMap<String, Vec<ClickRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a mapping without conflict checks.
    pub fn put(&self, mapping: ShortUrlMapping) {
        self.urls.insert(mapping.hash.clone(), mapping);
    }

    /// Clicks recorded for a key, oldest first.
    pub fn clicks_for(&self, key: &str) -> Vec<ClickRecord> {
        self.clicks
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ShortUrlStore for MemoryStorage {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn create_with_code(&self, mapping: &ShortUrlMapping) -> StorageResult<ShortUrlMapping> {
        match self.urls.entry(mapping.hash.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(mapping.clone());
                Ok(mapping.clone())
            }
        }
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<ShortUrlMapping>> {
        Ok(self.urls.get(key).map(|entry| entry.value().clone()))
    }

    async fn update_validation(&self, key: &str, status: &ValidationStatus) -> Result<bool> {
        match self.urls.get_mut(key) {
            Some(mut entry) => {
                entry.validation = status.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn log_clicks(&self, clicks: &[ClickRecord]) -> Result<()> {
        for click in clicks {
            self.clicks
                .entry(click.hash.clone())
                .or_default()
                .push(click.clone());
        }
        Ok(())
    }

    async fn click_stats(&self, key: &str) -> Result<ClickStats> {
        Ok(self
            .clicks
            .get(key)
            .map(|entry| ClickStats::from_records(entry.value()))
            .unwrap_or_default())
    }
}

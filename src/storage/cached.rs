use crate::models::{ClickRecord, ClickStats, ShortUrlMapping, ValidationStatus};
use crate::storage::{ShortUrlStore, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Read-through cache in front of another store.
///
/// Redirects consult the same key several times (lookup, safety, reachability),
/// so every flag check after the first is served from memory. Only mappings
/// whose validation has completed are cached: entries still waiting for
/// validation, and unknown keys, always go to the inner store, so a lookup
/// racing with the validator can never pin a pre-validation row.
///
/// A validation update written by another process (`snip-admin revalidate`)
/// becomes visible once the entry expires after `ttl_secs`.
pub struct CachedStorage {
    inner: Arc<dyn ShortUrlStore>,
    read_cache: Cache<String, ShortUrlMapping>,
}

impl CachedStorage {
    pub fn new(inner: Arc<dyn ShortUrlStore>, max_cache_entries: u64, ttl_secs: u64) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(max_cache_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { inner, read_cache }
    }

    async fn invalidate_cache(&self, key: &str) {
        self.read_cache.invalidate(key).await;
    }
}

#[async_trait]
impl ShortUrlStore for CachedStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn create_with_code(&self, mapping: &ShortUrlMapping) -> StorageResult<ShortUrlMapping> {
        self.inner.create_with_code(mapping).await
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<ShortUrlMapping>> {
        if let Some(cached) = self.read_cache.get(key).await {
            return Ok(Some(cached));
        }

        let result = self.inner.find_by_key(key).await?;

        if let Some(mapping) = result.as_ref().filter(|m| m.validation.validated) {
            self.read_cache
                .insert(key.to_string(), mapping.clone())
                .await;
        }

        Ok(result)
    }

    async fn update_validation(&self, key: &str, status: &ValidationStatus) -> Result<bool> {
        let result = self.inner.update_validation(key, status).await?;

        if result {
            self.invalidate_cache(key).await;
        }

        Ok(result)
    }

    async fn log_clicks(&self, clicks: &[ClickRecord]) -> Result<()> {
        self.inner.log_clicks(clicks).await
    }

    async fn click_stats(&self, key: &str) -> Result<ClickStats> {
        self.inner.click_stats(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ShortUrlProperties, Verdict};
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_validation_update_invalidates_cache() {
        let inner = Arc::new(MemoryStorage::new());
        let cached = CachedStorage::new(inner.clone(), 100, 300);

        let mapping = ShortUrlMapping::new(
            "abc",
            "https://example.com",
            307,
            ShortUrlProperties::default(),
            false,
        );
        cached.create_with_code(&mapping).await.unwrap();
        assert!(!cached.is_safe("abc").await.unwrap());

        let status = ValidationStatus {
            validated: true,
            safe: Verdict::Pass,
            reachable: Verdict::Pass,
            country: None,
        };
        cached.update_validation("abc", &status).await.unwrap();

        assert!(cached.is_safe("abc").await.unwrap());
        assert!(cached.everything_checked("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_mapping_is_not_cached() {
        let inner = Arc::new(MemoryStorage::new());
        let cached = CachedStorage::new(inner.clone(), 100, 300);

        let mapping = ShortUrlMapping::new(
            "racy",
            "https://example.com",
            307,
            ShortUrlProperties::default(),
            false,
        );
        cached.create_with_code(&mapping).await.unwrap();

        // A lookup served before validation finishes
        let before = cached.find_by_key("racy").await.unwrap().unwrap();
        assert!(!before.validation.validated);

        // The validator writes to the inner store after that lookup
        let status = ValidationStatus {
            validated: true,
            safe: Verdict::Pass,
            reachable: Verdict::Pass,
            country: None,
        };
        inner.update_validation("racy", &status).await.unwrap();

        assert!(cached.is_safe("racy").await.unwrap());
        assert!(cached.is_reachable("racy").await.unwrap());
    }

    #[tokio::test]
    async fn test_validated_mapping_is_served_from_cache() {
        let inner = Arc::new(MemoryStorage::new());
        let cached = CachedStorage::new(inner.clone(), 100, 300);

        let mut mapping = ShortUrlMapping::new(
            "done",
            "https://example.com",
            307,
            ShortUrlProperties::default(),
            false,
        );
        mapping.validation.validated = true;
        mapping.validation.safe = Verdict::Pass;
        inner.put(mapping);

        assert!(cached.is_safe("done").await.unwrap());

        // Writes that bypass the cache are not seen until the entry expires
        let status = ValidationStatus {
            validated: true,
            safe: Verdict::Fail,
            reachable: Verdict::Fail,
            country: None,
        };
        inner.update_validation("done", &status).await.unwrap();
        assert!(cached.is_safe("done").await.unwrap());

        // Writes through the cache invalidate it
        cached.update_validation("done", &status).await.unwrap();
        assert!(!cached.is_safe("done").await.unwrap());
    }

    #[tokio::test]
    async fn test_negative_lookup_replaced_on_create() {
        let inner = Arc::new(MemoryStorage::new());
        let cached = CachedStorage::new(inner, 100, 300);

        assert!(cached.find_by_key("later").await.unwrap().is_none());

        let mapping = ShortUrlMapping::new(
            "later",
            "https://example.com",
            307,
            ShortUrlProperties::default(),
            false,
        );
        cached.create_with_code(&mapping).await.unwrap();

        assert!(cached.find_by_key("later").await.unwrap().is_some());
    }
}

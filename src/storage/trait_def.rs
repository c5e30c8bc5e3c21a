use crate::models::{ClickRecord, ClickStats, ShortUrlMapping, ValidationStatus};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short key already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait ShortUrlStore: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Persist a new mapping; fails with `Conflict` when the key is taken
    async fn create_with_code(&self, mapping: &ShortUrlMapping) -> StorageResult<ShortUrlMapping>;

    /// Get a mapping by its short key
    async fn find_by_key(&self, key: &str) -> Result<Option<ShortUrlMapping>>;

    /// Overwrite the validation status of a mapping. Returns false for unknown keys.
    async fn update_validation(&self, key: &str, status: &ValidationStatus) -> Result<bool>;

    /// Append a batch of clicks
    async fn log_clicks(&self, clicks: &[ClickRecord]) -> Result<()>;

    /// Click totals for a key
    async fn click_stats(&self, key: &str) -> Result<ClickStats>;

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.find_by_key(key).await?.is_some())
    }

    /// True only once the safety check has passed. Unknown keys are not safe.
    async fn is_safe(&self, key: &str) -> Result<bool> {
        Ok(self
            .find_by_key(key)
            .await?
            .is_some_and(|m| m.validation.safe.passed()))
    }

    /// True only once the reachability check has passed.
    async fn is_reachable(&self, key: &str) -> Result<bool> {
        Ok(self
            .find_by_key(key)
            .await?
            .is_some_and(|m| m.validation.reachable.passed()))
    }

    /// True when every asynchronous check has completed for the key.
    async fn everything_checked(&self, key: &str) -> Result<bool> {
        Ok(self
            .find_by_key(key)
            .await?
            .is_some_and(|m| m.validation.validated))
    }

    async fn log_click(&self, click: &ClickRecord) -> Result<()> {
        self.log_clicks(std::slice::from_ref(click)).await
    }
}

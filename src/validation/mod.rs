//! Asynchronous safety and reachability validation of target URLs.
//!
//! Checks run after a mapping is stored. Their outcome is written back through
//! [`ShortUrlStore::update_validation`], which is what the request pipeline
//! reads before allowing a redirect.

pub mod reachability;
pub mod safe_browsing;

pub use reachability::HttpReachabilityChecker;
pub use safe_browsing::SafeBrowsingChecker;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ValidationConfig;
use crate::models::{ShortUrlMapping, ValidationStatus, Verdict};
use crate::storage::ShortUrlStore;

#[async_trait]
pub trait SafetyChecker: Send + Sync {
    async fn is_safe(&self, url: &str) -> Result<bool>;
}

#[async_trait]
pub trait ReachabilityChecker: Send + Sync {
    async fn is_reachable(&self, url: &str) -> Result<bool>;
}

/// Checker with fixed answers. Used when no Safe Browsing key is configured
/// and in tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticChecker {
    pub safe: bool,
    pub reachable: bool,
}

impl StaticChecker {
    pub fn permissive() -> Self {
        Self {
            safe: true,
            reachable: true,
        }
    }
}

#[async_trait]
impl SafetyChecker for StaticChecker {
    async fn is_safe(&self, _url: &str) -> Result<bool> {
        Ok(self.safe)
    }
}

#[async_trait]
impl ReachabilityChecker for StaticChecker {
    async fn is_reachable(&self, _url: &str) -> Result<bool> {
        Ok(self.reachable)
    }
}

pub struct Validator {
    storage: Arc<dyn ShortUrlStore>,
    safety: Arc<dyn SafetyChecker>,
    reachability: Arc<dyn ReachabilityChecker>,
}

impl Validator {
    pub fn new(
        storage: Arc<dyn ShortUrlStore>,
        safety: Arc<dyn SafetyChecker>,
        reachability: Arc<dyn ReachabilityChecker>,
    ) -> Self {
        Self {
            storage,
            safety,
            reachability,
        }
    }

    /// Build the production checkers from configuration.
    pub fn from_config(storage: Arc<dyn ShortUrlStore>, config: &ValidationConfig) -> Result<Self> {
        let safety: Arc<dyn SafetyChecker> = match &config.safe_browsing_api_key {
            Some(key) => Arc::new(SafeBrowsingChecker::new(&config.safe_browsing_url, key)?),
            None => {
                warn!("SAFE_BROWSING_API_KEY not set, every URL will be considered safe");
                Arc::new(StaticChecker::permissive())
            }
        };
        let reachability = Arc::new(HttpReachabilityChecker::new(config.reachability_timeout_ms)?);

        Ok(Self::new(storage, safety, reachability))
    }

    /// Run both checks and persist the outcome. A checker error counts as a
    /// failed check.
    pub async fn validate(&self, mapping: &ShortUrlMapping) -> Result<ValidationStatus> {
        let target = mapping.redirection.target.as_str();
        let (safe, reachable) = tokio::join!(
            self.safety.is_safe(target),
            self.reachability.is_reachable(target)
        );

        let safe = safe.unwrap_or_else(|e| {
            warn!(short_code = %mapping.hash, error = %e, "safety check failed");
            false
        });
        let reachable = reachable.unwrap_or_else(|e| {
            warn!(short_code = %mapping.hash, error = %e, "reachability check failed");
            false
        });

        let status = ValidationStatus {
            validated: true,
            safe: Verdict::from(safe),
            reachable: Verdict::from(reachable),
            country: mapping.validation.country.clone(),
        };
        self.storage.update_validation(&mapping.hash, &status).await?;

        info!(short_code = %mapping.hash, safe, reachable, "validation completed");
        Ok(status)
    }
}

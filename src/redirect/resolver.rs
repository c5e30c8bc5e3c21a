use std::sync::Arc;

use crate::error::ShortenerError;
use crate::models::Redirection;
use crate::storage::ShortUrlStore;

/// Looks up where a short key points. No status checks happen here.
#[derive(Clone)]
pub struct RedirectResolver {
    storage: Arc<dyn ShortUrlStore>,
}

impl RedirectResolver {
    pub fn new(storage: Arc<dyn ShortUrlStore>) -> Self {
        Self { storage }
    }

    pub async fn resolve(&self, key: &str) -> Result<Redirection, ShortenerError> {
        self.storage
            .find_by_key(key)
            .await?
            .map(|mapping| mapping.redirection)
            .ok_or_else(|| ShortenerError::RedirectionNotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ShortUrlMapping, ShortUrlProperties};
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_resolve_returns_target_and_mode_verbatim() {
        let storage = Arc::new(MemoryStorage::new());
        // Unvalidated mappings still resolve at this layer
        storage.put(ShortUrlMapping::new(
            "abc",
            "https://example.com/a",
            301,
            ShortUrlProperties::default(),
            false,
        ));
        let resolver = RedirectResolver::new(storage);

        let redirection = resolver.resolve("abc").await.unwrap();
        assert_eq!(redirection.target, "https://example.com/a");
        assert_eq!(redirection.mode, 301);

        assert!(matches!(
            resolver.resolve("nope").await,
            Err(ShortenerError::RedirectionNotFound(key)) if key == "nope"
        ));
    }
}

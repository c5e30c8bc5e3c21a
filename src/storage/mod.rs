pub mod cached;
pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use cached::CachedStorage;
pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{ShortUrlStore, StorageError, StorageResult};

use crate::config::{DatabaseBackend, DatabaseConfig};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Open the configured SQL backend and create its tables.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn ShortUrlStore>> {
    let storage: Arc<dyn ShortUrlStore> = match config.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.url);
            Arc::new(
                SqliteStorage::new(&config.url, config.max_connections)
                    .await
                    .context("failed to open SQLite database")?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            Arc::new(
                PostgresStorage::new(&config.url, config.max_connections)
                    .await
                    .context("failed to connect to PostgreSQL")?,
            )
        }
    };

    storage.init().await.context("failed to initialize database")?;
    Ok(storage)
}

use crate::models::{ClickRecord, ClickStats, ShortUrlMapping, ShortUrlRow, ValidationStatus};
use crate::storage::{ShortUrlStore, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl ShortUrlStore for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS short_urls (
                hash TEXT PRIMARY KEY,
                target TEXT NOT NULL,
                mode INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                owner TEXT,
                sponsor TEXT,
                ip TEXT,
                want_qr INTEGER NOT NULL DEFAULT 0,
                validated INTEGER NOT NULL DEFAULT 0,
                safe INTEGER,
                reachable INTEGER,
                country TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hash TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                ip TEXT,
                browser TEXT NOT NULL,
                platform TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_clicks_hash ON clicks(hash)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_with_code(&self, mapping: &ShortUrlMapping) -> StorageResult<ShortUrlMapping> {
        let result = sqlx::query(
            r#"
            INSERT INTO short_urls
                (hash, target, mode, created_at, owner, sponsor, ip, want_qr,
                 validated, safe, reachable, country)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(hash) DO NOTHING
            "#,
        )
        .bind(&mapping.hash)
        .bind(&mapping.redirection.target)
        .bind(i32::from(mapping.redirection.mode))
        .bind(mapping.created.timestamp())
        .bind(&mapping.properties.owner)
        .bind(&mapping.properties.sponsor)
        .bind(&mapping.properties.ip)
        .bind(mapping.want_qr)
        .bind(mapping.validation.validated)
        .bind(mapping.validation.safe.as_option())
        .bind(mapping.validation.reachable.as_option())
        .bind(&mapping.validation.country)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        Ok(mapping.clone())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<ShortUrlMapping>> {
        let row = sqlx::query_as::<_, ShortUrlRow>(
            r#"
            SELECT hash, target, mode, created_at, owner, sponsor, ip, want_qr,
                   validated, safe, reachable, country
            FROM short_urls
            WHERE hash = ?
            "#,
        )
        .bind(key)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(ShortUrlMapping::from))
    }

    async fn update_validation(&self, key: &str, status: &ValidationStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE short_urls
            SET validated = ?, safe = ?, reachable = ?, country = ?
            WHERE hash = ?
            "#,
        )
        .bind(status.validated)
        .bind(status.safe.as_option())
        .bind(status.reachable.as_option())
        .bind(&status.country)
        .bind(key)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn log_clicks(&self, clicks: &[ClickRecord]) -> Result<()> {
        if clicks.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for click in clicks {
            sqlx::query(
                r#"
                INSERT INTO clicks (hash, created_at, ip, browser, platform)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&click.hash)
            .bind(click.created.timestamp())
            .bind(&click.properties.ip)
            .bind(&click.properties.browser)
            .bind(&click.properties.platform)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn click_stats(&self, key: &str) -> Result<ClickStats> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clicks WHERE hash = ?")
            .bind(key)
            .fetch_one(self.pool.as_ref())
            .await?;

        let browsers = sqlx::query_as::<_, (String, i64)>(
            "SELECT browser, COUNT(*) FROM clicks WHERE hash = ? GROUP BY browser",
        )
        .bind(key)
        .fetch_all(self.pool.as_ref())
        .await?;

        let platforms = sqlx::query_as::<_, (String, i64)>(
            "SELECT platform, COUNT(*) FROM clicks WHERE hash = ? GROUP BY platform",
        )
        .bind(key)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(ClickStats {
            total,
            browsers: browsers.into_iter().collect(),
            platforms: platforms.into_iter().collect(),
        })
    }
}

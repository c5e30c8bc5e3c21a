use anyhow::{bail, Context};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    /// Base used to build canonical redirect URIs, without trailing slash
    pub public_base_url: String,
    /// HTTP status used for new mappings
    pub default_redirect_mode: u16,
    pub cache: CacheConfig,
    pub clicks: ClickConfig,
    pub validation: ValidationConfig,
    /// Allowed requests per key per minute; 0 disables the limiter
    pub rate_limit_per_minute: u32,
    pub geoip_country_db_path: Option<String>,
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickConfig {
    /// Capacity of the channel feeding the click writer
    pub buffer_size: usize,
    pub flush_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Google Safe Browsing key; without one every URL is considered safe
    pub safe_browsing_api_key: Option<String>,
    pub safe_browsing_url: String,
    pub reachability_timeout_ms: u64,
    /// How long a create request waits for validation before answering
    pub wait_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub mode: TrustedProxyMode,
    pub num_trusted_proxies: Option<usize>,
    pub trusted_proxies: Vec<IpNet>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    #[default]
    None,
    Standard,
    Cloudflare,
}

impl ValidationConfig {
    pub const DEFAULT_SAFE_BROWSING_URL: &'static str = "https://safebrowsing.googleapis.com";
}

const REDIRECT_MODES: [u16; 5] = [301, 302, 303, 307, 308];

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {name}: '{value}'")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend = match env_or("DATABASE_BACKEND", "sqlite").to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres"
                );
                DatabaseBackend::Sqlite
            }
        };
        let database_url = env_or("DATABASE_URL", "sqlite://./snip.db?mode=rwc");
        let max_connections = env_parse("DATABASE_MAX_CONNECTIONS", 5u32)?;

        let host = env_or("SERVER_HOST", "127.0.0.1");
        let port = env_parse("SERVER_PORT", 8080u16)?;
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}"))
            .trim_end_matches('/')
            .to_string();

        let default_redirect_mode = env_parse("DEFAULT_REDIRECT_MODE", 307u16)?;
        if !REDIRECT_MODES.contains(&default_redirect_mode) {
            bail!(
                "DEFAULT_REDIRECT_MODE must be one of {REDIRECT_MODES:?}, got {default_redirect_mode}"
            );
        }

        let cache = CacheConfig {
            max_entries: env_parse("CACHE_MAX_ENTRIES", 10_000u64)?,
            ttl_secs: env_parse("CACHE_TTL_SECS", 300u64)?,
        };

        let clicks = ClickConfig {
            buffer_size: env_parse("CLICK_BUFFER_SIZE", 100_000usize)?,
            flush_interval_ms: env_parse("CLICK_FLUSH_INTERVAL_MS", 1_000u64)?,
        };

        let validation = ValidationConfig {
            safe_browsing_api_key: std::env::var("SAFE_BROWSING_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            safe_browsing_url: env_or(
                "SAFE_BROWSING_URL",
                ValidationConfig::DEFAULT_SAFE_BROWSING_URL,
            ),
            reachability_timeout_ms: env_parse("REACHABILITY_TIMEOUT_MS", 5_000u64)?,
            wait_ms: env_parse("VALIDATION_WAIT_MS", 2_000u64)?,
        };

        let rate_limit_per_minute = env_parse("RATE_LIMIT_PER_MINUTE", 600u32)?;
        let geoip_country_db_path = std::env::var("GEOIP_COUNTRY_DB_PATH").ok();

        let mode = match env_or("TRUSTED_PROXY_MODE", "none").to_lowercase().as_str() {
            "none" => TrustedProxyMode::None,
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard, cloudflare"
                );
                TrustedProxyMode::None
            }
        };
        let num_trusted_proxies = std::env::var("NUM_TRUSTED_PROXIES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok());
        let trusted_proxies = std::env::var("TRUSTED_PROXIES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<IpNet>()
                    .with_context(|| format!("invalid CIDR in TRUSTED_PROXIES: '{s}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            public_base_url,
            default_redirect_mode,
            cache,
            clicks,
            validation,
            rate_limit_per_minute,
            geoip_country_db_path,
            proxy: ProxyConfig {
                mode,
                num_trusted_proxies,
                trusted_proxies,
            },
        })
    }
}

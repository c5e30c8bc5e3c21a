//! Allocation of new short URL mappings.

use anyhow::anyhow;
use async_trait::async_trait;
use rand::RngExt;
use std::net::IpAddr;
use url::Host;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analytics::GeoIpService;
use crate::error::ShortenerError;
use crate::models::{ShortUrlMapping, ShortUrlProperties};
use crate::storage::{ShortUrlStore, StorageError};
use crate::validation::Validator;

const KEY_LENGTH: usize = 7;
const KEY_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const MAX_GENERATION_ATTEMPTS: usize = 10;
const MAX_CUSTOM_KEY_LENGTH: usize = 32;

/// Path prefixes owned by other routes; keys may not start with them.
pub const RESERVED_PREFIXES: [&str; 2] = ["api", "index"];

#[async_trait]
pub trait ShortUrlCreator: Send + Sync {
    /// Store a new mapping for `url` and return it with whatever validation
    /// status is known by the time this returns.
    async fn create(
        &self,
        url: &str,
        properties: ShortUrlProperties,
        custom_url: Option<&str>,
        want_qr: bool,
    ) -> Result<ShortUrlMapping, ShortenerError>;
}

pub struct DefaultCreator {
    storage: Arc<dyn ShortUrlStore>,
    validator: Arc<Validator>,
    geoip: Option<Arc<GeoIpService>>,
    default_mode: u16,
    validation_wait: Duration,
}

/// Accept only absolute http(s) URLs pointing at public hosts.
///
/// The reachability probe requests the target from this server, so loopback,
/// private and link-local literals (and `localhost`) are refused. Names that
/// only resolve to such addresses are not caught here.
pub fn validate_url(url: &str) -> Result<(), ShortenerError> {
    let public = match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => match parsed.host() {
            Some(Host::Domain(domain)) => {
                let domain = domain.trim_end_matches('.').to_ascii_lowercase();
                domain != "localhost" && !domain.ends_with(".localhost")
            }
            Some(Host::Ipv4(ip)) => is_public_ip(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => is_public_ip(IpAddr::V6(ip)),
            None => false,
        },
        _ => false,
    };

    if public {
        Ok(())
    } else {
        Err(ShortenerError::InvalidUrl(url.to_string()))
    }
}

fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_ip(IpAddr::V4(v4)),
            None => {
                let first = v6.segments()[0];
                // fc00::/7 unique local, fe80::/10 link-local
                !(v6.is_loopback()
                    || v6.is_unspecified()
                    || (first & 0xfe00) == 0xfc00
                    || (first & 0xffc0) == 0xfe80)
            }
        },
    }
}

fn validate_custom_key(key: &str) -> Result<(), ShortenerError> {
    let well_formed = key.len() <= MAX_CUSTOM_KEY_LENGTH
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !well_formed {
        return Err(ShortenerError::InvalidUrl(key.to_string()));
    }
    if RESERVED_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) {
        return Err(ShortenerError::HashUsed(key.to_string()));
    }
    Ok(())
}

pub fn generate_key() -> String {
    let mut rng = rand::rng();
    (0..KEY_LENGTH)
        .map(|_| KEY_ALPHABET[rng.random_range(0..KEY_ALPHABET.len())] as char)
        .collect()
}

impl DefaultCreator {
    pub fn new(
        storage: Arc<dyn ShortUrlStore>,
        validator: Arc<Validator>,
        default_mode: u16,
        validation_wait: Duration,
    ) -> Self {
        Self {
            storage,
            validator,
            geoip: None,
            default_mode,
            validation_wait,
        }
    }

    pub fn with_geoip(mut self, geoip: Arc<GeoIpService>) -> Self {
        self.geoip = Some(geoip);
        self
    }

    fn country_of(&self, ip: Option<&str>) -> Option<String> {
        let geoip = self.geoip.as_ref()?;
        let ip = ip?.parse::<IpAddr>().ok()?;
        geoip.country(ip)
    }

    async fn insert_custom(&self, mapping: ShortUrlMapping) -> Result<ShortUrlMapping, ShortenerError> {
        match self.storage.create_with_code(&mapping).await {
            Ok(created) => Ok(created),
            Err(StorageError::Conflict) => Err(ShortenerError::HashUsed(mapping.hash)),
            Err(StorageError::Other(e)) => Err(e.into()),
        }
    }

    async fn insert_generated(
        &self,
        mut mapping: ShortUrlMapping,
    ) -> Result<ShortUrlMapping, ShortenerError> {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            mapping.hash = generate_key();
            match self.storage.create_with_code(&mapping).await {
                Ok(created) => return Ok(created),
                Err(StorageError::Conflict) => {
                    debug!(short_code = %mapping.hash, "generated key collided, retrying");
                }
                Err(StorageError::Other(e)) => return Err(e.into()),
            }
        }
        Err(anyhow!("failed to generate a unique short key").into())
    }

    /// Start validation in the background and wait a bounded time for it.
    async fn await_validation(&self, mut mapping: ShortUrlMapping) -> ShortUrlMapping {
        let validator = Arc::clone(&self.validator);
        let pending = mapping.clone();
        let task = tokio::spawn(async move { validator.validate(&pending).await });

        match tokio::time::timeout(self.validation_wait, task).await {
            Ok(Ok(Ok(status))) => mapping.validation = status,
            Ok(Ok(Err(e))) => {
                warn!(short_code = %mapping.hash, error = %e, "failed to store validation result")
            }
            Ok(Err(e)) => warn!(short_code = %mapping.hash, error = %e, "validation task panicked"),
            Err(_) => debug!(short_code = %mapping.hash, "validation still running"),
        }
        mapping
    }
}

#[async_trait]
impl ShortUrlCreator for DefaultCreator {
    async fn create(
        &self,
        url: &str,
        properties: ShortUrlProperties,
        custom_url: Option<&str>,
        want_qr: bool,
    ) -> Result<ShortUrlMapping, ShortenerError> {
        validate_url(url)?;

        let country = self.country_of(properties.ip.as_deref());
        let custom = custom_url.map(str::trim).filter(|key| !key.is_empty());

        let mut mapping = ShortUrlMapping::new(
            custom.unwrap_or_default(),
            url,
            self.default_mode,
            properties,
            want_qr,
        );
        mapping.validation.country = country;

        let mapping = match custom {
            Some(key) => {
                validate_custom_key(key)?;
                self.insert_custom(mapping).await?
            }
            None => self.insert_generated(mapping).await?,
        };

        info!(short_code = %mapping.hash, target = %url, "short url created");
        Ok(self.await_validation(mapping).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Verdict;
    use crate::storage::MemoryStorage;
    use crate::validation::StaticChecker;

    fn creator(storage: Arc<MemoryStorage>, checker: StaticChecker) -> DefaultCreator {
        let validator = Arc::new(Validator::new(
            storage.clone(),
            Arc::new(checker),
            Arc::new(checker),
        ));
        DefaultCreator::new(storage, validator, 307, Duration::from_secs(1))
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/path?q=1").is_ok());
        assert!(validate_url("http://93.184.216.34/").is_ok());
        assert!(matches!(
            validate_url("ftp://example.com"),
            Err(ShortenerError::InvalidUrl(_))
        ));
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("").is_err());
    }

    #[test]
    fn test_validate_url_refuses_local_targets() {
        for url in [
            "http://localhost:8080",
            "http://api.localhost/",
            "http://127.0.0.1/admin",
            "http://10.1.2.3/",
            "http://192.168.0.1/",
            "http://172.16.0.5/",
            "http://169.254.169.254/latest/meta-data/",
            "http://0.0.0.0/",
            "http://[::1]/",
            "http://[fd00::1]/",
            "http://[fe80::1]/",
            "http://[::ffff:127.0.0.1]/",
        ] {
            assert!(
                matches!(validate_url(url), Err(ShortenerError::InvalidUrl(_))),
                "{url} should be refused"
            );
        }
        assert!(validate_url("http://[2606:4700::1111]/").is_ok());
    }

    #[test]
    fn test_generated_keys_use_base62() {
        let key = generate_key();
        assert_eq!(key.len(), KEY_LENGTH);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_create_waits_for_validation() {
        let storage = Arc::new(MemoryStorage::new());
        let creator = creator(storage.clone(), StaticChecker::permissive());

        let properties = ShortUrlProperties {
            ip: Some("127.0.0.1".into()),
            sponsor: Some("acme".into()),
            owner: None,
        };
        let mapping = creator
            .create("https://example.com", properties, None, false)
            .await
            .unwrap();

        assert!(mapping.validation.validated);
        assert_eq!(mapping.validation.safe, Verdict::Pass);
        assert_eq!(mapping.redirection.mode, 307);
        assert!(storage.everything_checked(&mapping.hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_custom_key_collision() {
        let storage = Arc::new(MemoryStorage::new());
        let creator = creator(storage, StaticChecker::permissive());

        creator
            .create("https://example.com", ShortUrlProperties::default(), Some("mine"), false)
            .await
            .unwrap();

        let err = creator
            .create("https://other.com", ShortUrlProperties::default(), Some("mine"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::HashUsed(key) if key == "mine"));
    }

    #[tokio::test]
    async fn test_custom_key_rules() {
        let storage = Arc::new(MemoryStorage::new());
        let creator = creator(storage, StaticChecker::permissive());

        let err = creator
            .create("https://example.com", ShortUrlProperties::default(), Some("has space"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidUrl(_)));

        let err = creator
            .create("https://example.com", ShortUrlProperties::default(), Some("api-docs"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::HashUsed(_)));

        // Blank custom keys fall back to generated ones
        let mapping = creator
            .create("https://example.com", ShortUrlProperties::default(), Some("  "), false)
            .await
            .unwrap();
        assert_eq!(mapping.hash.len(), KEY_LENGTH);
    }
}

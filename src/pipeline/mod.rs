//! Request pipeline: the checks applied when resolving or creating a short URL.
//!
//! Each operation is a single deterministic pass. Every failed check is
//! reported as its own [`ShortenerError`] kind and nothing is retried here;
//! callers decide whether to retry (guided by the retry-after hint).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::clicks::ClickLogger;
use crate::creator::ShortUrlCreator;
use crate::error::ShortenerError;
use crate::links::LinkBuilder;
use crate::models::{present_or_default, ClickProperties, ShortUrlProperties};
use crate::qr::QrGenerator;
use crate::ratelimit::KeyRateLimiter;
use crate::redirect::resolver::RedirectResolver;
use crate::storage::ShortUrlStore;
use crate::useragent::UserAgentClassifier;

/// Where to send the visitor and with which status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectOutcome {
    pub location: String,
    pub status_code: u16,
}

/// Input of a create request.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub url: String,
    pub sponsor: Option<String>,
    pub custom_url: Option<String>,
    pub want_qr: bool,
}

/// Body returned by create and info requests.
#[derive(Debug, Clone, Serialize)]
pub struct ShortUrlDataOut<P> {
    pub url: String,
    pub properties: P,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedProperties {
    pub safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfoProperties {
    pub hash: String,
    pub safe: bool,
    pub reachable: bool,
    pub country: String,
    pub created: DateTime<Utc>,
    pub owner: String,
    pub ip: String,
    pub sponsor: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClickStatsOut {
    pub hash: String,
    pub clicks: i64,
    pub browsers: BTreeMap<String, i64>,
    pub platforms: BTreeMap<String, i64>,
}

pub struct RequestPipeline {
    storage: Arc<dyn ShortUrlStore>,
    resolver: RedirectResolver,
    creator: Arc<dyn ShortUrlCreator>,
    clicks: Arc<dyn ClickLogger>,
    classifier: Arc<dyn UserAgentClassifier>,
    qr: Arc<dyn QrGenerator>,
    links: LinkBuilder,
    limiter: Option<KeyRateLimiter>,
}

impl RequestPipeline {
    pub fn new(
        storage: Arc<dyn ShortUrlStore>,
        creator: Arc<dyn ShortUrlCreator>,
        clicks: Arc<dyn ClickLogger>,
        classifier: Arc<dyn UserAgentClassifier>,
        qr: Arc<dyn QrGenerator>,
        links: LinkBuilder,
    ) -> Self {
        Self {
            resolver: RedirectResolver::new(Arc::clone(&storage)),
            storage,
            creator,
            clicks,
            classifier,
            qr,
            links,
            limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Option<KeyRateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn rate_limiter(&self) -> Option<&KeyRateLimiter> {
        self.limiter.as_ref()
    }

    fn check_quota(&self, key: &str) -> Result<(), ShortenerError> {
        match &self.limiter {
            Some(limiter) => limiter.check(key),
            None => Ok(()),
        }
    }

    /// Resolve `key`, record the visit and decide whether to redirect.
    ///
    /// The click is recorded before the safety and reachability checks, so
    /// visits to links that are later rejected still show up in statistics.
    pub async fn handle_redirect(
        &self,
        key: &str,
        client_ip: &str,
        user_agent: &str,
    ) -> Result<RedirectOutcome, ShortenerError> {
        let redirection = self.resolver.resolve(key).await?;
        self.check_quota(key)?;

        let (browser, platform) = self.classifier.classify(user_agent);
        self.clicks.log(
            key,
            ClickProperties {
                ip: Some(client_ip.to_string()),
                browser,
                platform,
            },
        );

        if !self.storage.is_safe(key).await? {
            warn!(short_code = %key, "redirect refused: target not safe");
            return Err(ShortenerError::UrlNotSafe(redirection.target));
        }
        if !self.storage.is_reachable(key).await? {
            warn!(short_code = %key, "redirect refused: target not reachable");
            return Err(ShortenerError::UrlNotReachable(redirection.target));
        }

        Ok(RedirectOutcome {
            location: redirection.target,
            status_code: redirection.mode,
        })
    }

    /// Create a mapping and answer only once it is known to be usable.
    pub async fn handle_create(
        &self,
        request: CreateRequest,
        client_ip: &str,
    ) -> Result<ShortUrlDataOut<CreatedProperties>, ShortenerError> {
        let properties = ShortUrlProperties {
            ip: Some(client_ip.to_string()),
            sponsor: request.sponsor.filter(|s| !s.is_empty()),
            owner: None,
        };
        let mapping = self
            .creator
            .create(
                &request.url,
                properties,
                request.custom_url.as_deref(),
                request.want_qr,
            )
            .await?;
        let hash = mapping.hash.as_str();

        if !self.storage.everything_checked(hash).await? {
            warn!(short_code = %hash, "create answered before validation finished");
            return Err(ShortenerError::NotValidatedYet(request.url));
        }
        let safe = self.storage.is_safe(hash).await?;
        if !safe {
            warn!(short_code = %hash, "created url is not safe");
            return Err(ShortenerError::UrlNotSafe(request.url));
        }
        if !self.storage.is_reachable(hash).await? {
            warn!(short_code = %hash, "created url is not reachable");
            return Err(ShortenerError::UrlNotReachable(request.url));
        }

        Ok(ShortUrlDataOut {
            url: self.links.redirect_uri(hash),
            properties: CreatedProperties {
                safe,
                qr: mapping.want_qr.then(|| self.links.qr_uri(hash)),
            },
        })
    }

    /// Everything known about `key`, with undetermined properties defaulted.
    pub async fn handle_show_info(
        &self,
        key: &str,
    ) -> Result<ShortUrlDataOut<InfoProperties>, ShortenerError> {
        let mapping = self
            .storage
            .find_by_key(key)
            .await?
            .ok_or_else(|| ShortenerError::ShowShortUrlInfoNotFound(key.to_string()))?;
        self.check_quota(key)?;

        let validation = mapping.validation;
        let properties = mapping.properties;
        Ok(ShortUrlDataOut {
            url: self.links.redirect_uri(&mapping.hash),
            properties: InfoProperties {
                safe: present_or_default(validation.safe.as_option()),
                reachable: present_or_default(validation.reachable.as_option()),
                country: present_or_default(validation.country),
                created: mapping.created,
                owner: present_or_default(properties.owner),
                ip: present_or_default(properties.ip),
                sponsor: present_or_default(properties.sponsor),
                hash: mapping.hash,
            },
        })
    }

    pub async fn handle_stats(&self, key: &str) -> Result<ClickStatsOut, ShortenerError> {
        if !self.storage.exists(key).await? {
            return Err(ShortenerError::ShowShortUrlInfoNotFound(key.to_string()));
        }

        let stats = self.storage.click_stats(key).await?;
        Ok(ClickStatsOut {
            hash: key.to_string(),
            clicks: stats.total,
            browsers: stats.browsers,
            platforms: stats.platforms,
        })
    }

    pub async fn handle_qr(&self, hash: &str) -> Result<Vec<u8>, ShortenerError> {
        self.qr.generate(hash).await
    }
}

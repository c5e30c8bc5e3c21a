//! Per-key request quota.
//!
//! A GCRA limiter keyed by short key: each key may be requested `limit` times
//! per minute, with bursts up to the same amount.

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

use crate::error::ShortenerError;

pub struct KeyRateLimiter {
    inner: DefaultKeyedRateLimiter<String>,
}

impl KeyRateLimiter {
    pub fn per_minute(limit: NonZeroU32) -> Self {
        Self {
            inner: RateLimiter::keyed(Quota::per_minute(limit)),
        }
    }

    /// `None` when `limit` is zero, which disables limiting.
    pub fn from_limit(limit: u32) -> Option<Self> {
        NonZeroU32::new(limit).map(Self::per_minute)
    }

    pub fn check(&self, key: &str) -> Result<(), ShortenerError> {
        self.inner
            .check_key(&key.to_string())
            .map_err(|_| ShortenerError::TooManyRequests(key.to_string()))
    }

    /// Drop state for keys whose quota has fully replenished.
    pub fn retain_recent(&self) {
        self.inner.retain_recent();
    }
}

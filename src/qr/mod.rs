//! QR images for short URLs.

use anyhow::anyhow;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Luma};
use moka::future::Cache;
use qrcode::QrCode;
use std::io::Cursor;
use std::sync::Arc;

use crate::error::ShortenerError;
use crate::links::LinkBuilder;
use crate::storage::ShortUrlStore;

#[async_trait]
pub trait QrGenerator: Send + Sync {
    /// PNG bytes encoding the redirect URI of `hash`.
    async fn generate(&self, hash: &str) -> Result<Vec<u8>, ShortenerError>;
}

/// Renders PNGs on first request and keeps them in memory.
///
/// Only mappings created with `want_qr` have a QR image.
pub struct PngQrGenerator {
    storage: Arc<dyn ShortUrlStore>,
    links: LinkBuilder,
    cache: Cache<String, Vec<u8>>,
}

impl PngQrGenerator {
    pub fn new(storage: Arc<dyn ShortUrlStore>, links: LinkBuilder, max_entries: u64) -> Self {
        Self {
            storage,
            links,
            cache: Cache::new(max_entries),
        }
    }
}

pub fn render_png(data: &str) -> anyhow::Result<Vec<u8>> {
    let code = QrCode::new(data.as_bytes()).map_err(|e| anyhow!("failed to encode QR code: {e:?}"))?;
    let image = code.render::<Luma<u8>>().min_dimensions(256, 256).build();

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

#[async_trait]
impl QrGenerator for PngQrGenerator {
    async fn generate(&self, hash: &str) -> Result<Vec<u8>, ShortenerError> {
        if let Some(png) = self.cache.get(hash).await {
            return Ok(png);
        }

        match self.storage.find_by_key(hash).await? {
            Some(mapping) if mapping.want_qr => {
                let png = render_png(&self.links.redirect_uri(hash))?;
                self.cache.insert(hash.to_string(), png.clone()).await;
                Ok(png)
            }
            _ => Err(ShortenerError::QrNotFound(hash.to_string())),
        }
    }
}

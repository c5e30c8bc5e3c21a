//! GeoIP country lookup using a MaxMind GeoLite2/GeoIP2 MMDB
//!
//! Any Country or City database works: the City database is a superset of
//! the Country data and `geoip2::Country` only decodes the country fields.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

#[derive(Clone)]
pub struct GeoIpService {
    reader: Arc<Reader<Mmap>>,
}

impl GeoIpService {
    /// Memory-map the database at `path`.
    pub fn new(path: &str) -> Result<Self> {
        let reader = unsafe { Reader::open_mmap(path) }
            .with_context(|| format!("Failed to open GeoIP database at {}", path))?;

        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// ISO country code for `ip`, if the database knows it.
    pub fn country(&self, ip: IpAddr) -> Option<String> {
        let result = self.reader.lookup(ip).ok()?;
        let country = result.decode::<geoip2::Country>().ok()??;
        country.country.iso_code.map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geoip_service_creation_invalid_path() {
        let result = GeoIpService::new("/nonexistent/path.mmdb");
        assert!(result.is_err());
    }
}

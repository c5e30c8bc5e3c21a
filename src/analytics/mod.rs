//! Visitor analytics helpers
//!
//! Country lookup for creator addresses and trusted extraction of the
//! client IP recorded with every click.

pub mod geoip;
pub mod ip_extractor;

pub use geoip::GeoIpService;
pub use ip_extractor::extract_client_ip;

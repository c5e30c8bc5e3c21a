//! Client IP extraction from HTTP headers with trust validation
//!
//! - Validates trust chains for X-Forwarded-For and Forwarded headers
//! - Supports the Cloudflare CF-Connecting-IP header
//! - Falls back to the socket remote address when headers are untrusted

use axum::http::HeaderMap;
use std::net::IpAddr;
use tracing::warn;

use crate::config::{ProxyConfig, TrustedProxyMode};

/// Extract the client IP address according to the proxy trust configuration.
pub fn extract_client_ip(headers: &HeaderMap, socket_addr: IpAddr, config: &ProxyConfig) -> IpAddr {
    match config.mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => {
            extract_from_forwarded(headers, config)
                .or_else(|| extract_from_x_forwarded_for(headers, config))
                .unwrap_or(socket_addr)
        }
        TrustedProxyMode::None => socket_addr,
    }
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Parse an RFC 7239 `for=` value: quoted, bracketed IPv6 and ports are stripped.
fn parse_forwarded_for(value: &str) -> Option<IpAddr> {
    let value = value.trim().trim_matches('"');
    if let Some(rest) = value.strip_prefix('[') {
        return rest.split(']').next()?.parse().ok();
    }
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }
    value.split(':').next()?.parse().ok()
}

/// Parse the RFC 7239 Forwarded header
fn extract_from_forwarded(headers: &HeaderMap, config: &ProxyConfig) -> Option<IpAddr> {
    let forwarded = headers.get("forwarded")?.to_str().ok()?;

    let chain: Vec<IpAddr> = forwarded
        .split(',')
        .filter_map(|element| {
            element.split(';').find_map(|param| {
                let param = param.trim();
                let value = param
                    .strip_prefix("for=")
                    .or_else(|| param.strip_prefix("For="))?;
                parse_forwarded_for(value)
            })
        })
        .collect();

    select_from_chain(&chain, config)
}

fn extract_from_x_forwarded_for(headers: &HeaderMap, config: &ProxyConfig) -> Option<IpAddr> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    let chain: Vec<IpAddr> = xff
        .split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect();

    select_from_chain(&chain, config)
}

/// Walk the proxy chain right to left and return the first untrusted hop.
fn select_from_chain(chain: &[IpAddr], config: &ProxyConfig) -> Option<IpAddr> {
    if chain.is_empty() {
        return None;
    }

    if let Some(num_trusted) = config.num_trusted_proxies {
        if chain.len() > num_trusted {
            return Some(chain[chain.len() - num_trusted - 1]);
        }
        // Not enough hops, the leftmost entry is the best we have
        return chain.first().copied();
    }

    if !config.trusted_proxies.is_empty() {
        return chain
            .iter()
            .rev()
            .find(|ip| !config.trusted_proxies.iter().any(|net| net.contains(*ip)))
            .or_else(|| chain.first())
            .copied();
    }

    chain.last().copied()
}

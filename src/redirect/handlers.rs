use anyhow::anyhow;
use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, ConnectInfo, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::analytics::extract_client_ip;
use crate::api::AppState;
use crate::creator::RESERVED_PREFIXES;
use crate::error::ShortenerError;

fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Redirect to the target of a short key
pub async fn redirect_url(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, ShortenerError> {
    let Path(id) = path?;

    // Paths owned by the API and the index page are never short keys
    if RESERVED_PREFIXES.iter().any(|prefix| id.starts_with(prefix)) {
        return Err(ShortenerError::RedirectionNotFound(id));
    }

    let client_ip = extract_client_ip(&headers, addr.ip(), &state.proxy);
    let outcome = state
        .pipeline
        .handle_redirect(&id, &client_ip.to_string(), user_agent(&headers))
        .await?;

    let status = StatusCode::from_u16(outcome.status_code)
        .map_err(|e| anyhow!("invalid redirect mode {}: {e}", outcome.status_code))?;
    let location = HeaderValue::from_str(&outcome.location)
        .map_err(|e| anyhow!("target is not a valid Location header: {e}"))?;

    Ok((status, [(header::LOCATION, location)]).into_response())
}

/// PNG QR code of a short URL
pub async fn qr_code(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, ShortenerError> {
    let Path(hash) = path?;
    let png = state.pipeline.handle_qr(&hash).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], Bytes::from(png)))
}

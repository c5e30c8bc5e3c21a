use axum::{
    extract::{
        rejection::{FormRejection, PathRejection},
        ConnectInfo, Path, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::analytics::extract_client_ip;
use crate::config::ProxyConfig;
use crate::error::ShortenerError;
use crate::pipeline::{
    ClickStatsOut, CreateRequest, CreatedProperties, InfoProperties, RequestPipeline,
    ShortUrlDataOut,
};

pub struct AppState {
    pub pipeline: Arc<RequestPipeline>,
    pub proxy: ProxyConfig,
}

/// Form body of `POST /api/link`
///
/// A missing `url` decodes as empty and is rejected as an invalid URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortUrlDataIn {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sponsor: Option<String>,
    #[serde(default)]
    pub custom_url: Option<String>,
    #[serde(default, rename = "wantQR")]
    pub want_qr: bool,
}

/// Shorten a URL
pub async fn shortener(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    form: Result<Form<ShortUrlDataIn>, FormRejection>,
) -> Result<impl IntoResponse, ShortenerError> {
    let Form(data) = form?;
    let client_ip = extract_client_ip(&headers, addr.ip(), &state.proxy);
    let request = CreateRequest {
        url: data.url,
        sponsor: data.sponsor,
        custom_url: data.custom_url,
        want_qr: data.want_qr,
    };

    let created: ShortUrlDataOut<CreatedProperties> = state
        .pipeline
        .handle_create(request, &client_ip.to_string())
        .await?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, created.url.clone())],
        Json(created),
    ))
}

pub async fn show_short_url_info(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ShortUrlDataOut<InfoProperties>>, ShortenerError> {
    let Path(id) = path?;
    Ok(Json(state.pipeline.handle_show_info(&id).await?))
}

pub async fn click_stats(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ClickStatsOut>, ShortenerError> {
    let Path(id) = path?;
    Ok(Json(state.pipeline.handle_stats(&id).await?))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: &'static str,
    }

    Json(HealthResponse { status: "OK" })
}

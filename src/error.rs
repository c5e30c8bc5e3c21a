//! Error kinds surfaced by the request pipeline and their HTTP translation.

use axum::{
    extract::rejection::{FormRejection, PathRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

/// Value of the `Retry-after` hint sent with retryable failures.
pub const RETRY_AFTER_MS: u32 = 10_000;

#[derive(Debug, Error)]
pub enum ShortenerError {
    #[error("[{0}] does not follow a supported schema")]
    InvalidUrl(String),

    #[error("[{0}] is not known")]
    RedirectionNotFound(String),

    #[error("[{0}] is not a safe Url")]
    UrlNotSafe(String),

    #[error("[{0}] is not a reachable Url")]
    UrlNotReachable(String),

    #[error("[{0}] has not been validated yet")]
    NotValidatedYet(String),

    #[error("[{0}] is already mapped, so cant be mapped again")]
    HashUsed(String),

    #[error("QR [{0}] doesn't exist")]
    QrNotFound(String),

    #[error("Short Url with hash [{0}] doesn't exist")]
    ShowShortUrlInfoNotFound(String),

    #[error("Too many requests to the Short Url with hash [{0}]")]
    TooManyRequests(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ShortenerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidUrl(_)
            | Self::UrlNotReachable(_)
            | Self::NotValidatedYet(_)
            | Self::HashUsed(_)
            | Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Self::RedirectionNotFound(_)
            | Self::QrNotFound(_)
            | Self::ShowShortUrlInfoNotFound(_) => StatusCode::NOT_FOUND,
            // Kept at 403 even though 400 has been proposed for this case.
            Self::UrlNotSafe(_) => StatusCode::FORBIDDEN,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Delay, in milliseconds, the client should wait before retrying.
    pub fn retry_after(&self) -> Option<u32> {
        match self {
            Self::UrlNotReachable(_) | Self::TooManyRequests(_) => Some(RETRY_AFTER_MS),
            _ => None,
        }
    }
}

impl From<FormRejection> for ShortenerError {
    fn from(rejection: FormRejection) -> Self {
        Self::MalformedRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ShortenerError {
    fn from(rejection: PathRejection) -> Self {
        Self::MalformedRequest(rejection.body_text())
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub status_code: u16,
    pub message: String,
    pub timestamp: String,
}

impl ErrorMessage {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            message: message.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, false),
        }
    }
}

impl IntoResponse for ShortenerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (status, Json(ErrorMessage::new(status, message))).into_response();
        if let Some(delay) = self.retry_after() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(delay));
        }
        response
    }
}

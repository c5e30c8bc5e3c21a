use axum::{routing::get, Router};
use std::sync::Arc;

use crate::api::AppState;

use super::handlers::{qr_code, redirect_url};

pub fn create_redirect_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/{id}", get(redirect_url))
        .route("/{id}/qr", get(qr_code))
        .with_state(state)
}

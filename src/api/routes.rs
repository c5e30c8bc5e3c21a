use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::redirect::create_redirect_router;

use super::handlers::{click_stats, health_check, shortener, show_short_url_info, AppState};

pub fn create_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/link", post(shortener))
        .route("/link/{id}", get(show_short_url_info))
        .route("/link/{id}/stats", get(click_stats))
        .with_state(state)
}

/// The whole service: `/api/...` plus the redirect and QR routes at the root.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", create_api_router(Arc::clone(&state)))
        .merge(create_redirect_router(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

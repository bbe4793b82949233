//! HTTP surface for the scheduled refresh: a bearer-guarded trigger for an
//! external cron plus a read-only view of the refresh log.

use std::sync::Arc;

use axum::{routing::get, Router};

use prospect_scout::refresh::ScheduledRefresh;
use prospect_scout::traits::RefreshLogStore;

pub mod auth;
pub mod rest;

pub struct AppState {
    pub refresh: Arc<ScheduledRefresh>,
    pub run_log: Arc<dyn RefreshLogStore>,
    pub refresh_secret: String,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        .route(
            "/api/refresh/scheduled",
            get(rest::refresh::scheduled_refresh_handler)
                .post(rest::refresh::scheduled_refresh_handler),
        )
        .route("/api/refresh/log", get(rest::refresh::refresh_log_handler))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // method + path + status + latency only; the bearer token never reaches the logs
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info, warn};

use prospect_common::RefreshError;

use crate::auth::check_bearer;
use crate::AppState;

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "Unauthorized" })),
    )
        .into_response()
}

/// Scheduled trigger: run one refresh batch and return its summary.
pub async fn scheduled_refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if !check_bearer(&headers, &state.refresh_secret) {
        warn!("Scheduled refresh rejected: bad or missing bearer token");
        return unauthorized();
    }

    info!("Scheduled refresh triggered");
    match state.refresh.run().await {
        Ok(summary) => Json(summary).into_response(),
        Err(RefreshError::RefreshInProgress) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "A scheduled refresh is already running" })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Scheduled refresh failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Latest refresh outcome for every prospect.
pub async fn refresh_log_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if !check_bearer(&headers, &state.refresh_secret) {
        return unauthorized();
    }

    match state.run_log.load_all().await {
        Ok(mut entries) => {
            entries.sort_by(|a, b| b.last_refresh_at.cmp(&a.last_refresh_at));
            Json(serde_json::json!({ "entries": entries })).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load refresh log");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

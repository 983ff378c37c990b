use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    cache_entries: usize,
}

/// Health check endpoint
///
/// Reports the number of cached extraction results. A cache backend that
/// cannot be read makes the service unhealthy.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.deps.cache.len().await {
        Ok(cache_entries) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                cache_entries,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check could not read cache");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    cache_entries: 0,
                }),
            )
        }
    }
}

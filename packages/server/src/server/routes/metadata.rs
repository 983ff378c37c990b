use axum::{
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metadata_extractor::FailureKind;
use serde_json::json;

use crate::domains::metadata::{self, GatewayOutcome};
use crate::kernel::CachedExtraction;
use crate::server::app::AppState;
use crate::server::middleware::{ClientIp, ANONYMOUS_CALLER};

pub const EXTRACTED_MESSAGE: &str = "Metadata extracted successfully";
pub const CACHED_MESSAGE: &str = "Metadata retrieved from cache";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please try again later.";
pub const DEADLINE_MESSAGE: &str = "Request timeout: metadata extraction took too long";
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed. Use POST to extract metadata.";

/// POST /metadata/extract
///
/// The body is taken raw so a rate-limited caller is rejected before any
/// parsing happens.
pub async fn extract_metadata_handler(
    Extension(state): Extension<AppState>,
    client_ip: Option<Extension<ClientIp>>,
    body: Bytes,
) -> GatewayOutcome {
    let caller_id = client_ip
        .map(|Extension(ip)| ip.caller_id())
        .unwrap_or_else(|| ANONYMOUS_CALLER.to_string());

    metadata::extract_metadata(&state.deps, &caller_id, &body).await
}

/// GET /metadata/extract
pub async fn extract_metadata_method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": METHOD_NOT_ALLOWED_MESSAGE })),
    )
        .into_response()
}

/// Status for a failed extraction, fresh or replayed from cache.
pub fn failure_status(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::Timeout => StatusCode::REQUEST_TIMEOUT,
        FailureKind::Unreachable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for GatewayOutcome {
    fn into_response(self) -> Response {
        match self {
            GatewayOutcome::Completed {
                extraction:
                    CachedExtraction::Extracted {
                        metadata,
                        extracted_at,
                    },
                cached,
            } => {
                let message = if cached { CACHED_MESSAGE } else { EXTRACTED_MESSAGE };
                (
                    StatusCode::OK,
                    Json(json!({
                        "metadata": metadata,
                        "cached": cached,
                        "message": message,
                        "extractedAt": extracted_at,
                    })),
                )
                    .into_response()
            }
            GatewayOutcome::Completed {
                extraction:
                    CachedExtraction::Failed {
                        error,
                        kind,
                        fallback_data,
                        url,
                    },
                cached,
            } => (
                failure_status(kind),
                Json(json!({
                    "error": error,
                    "fallbackData": fallback_data,
                    "url": url,
                    "cached": cached,
                })),
            )
                .into_response(),
            GatewayOutcome::RateLimited {
                decision,
                retry_after_secs,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                [
                    ("retry-after", retry_after_secs.to_string()),
                    ("x-ratelimit-limit", decision.limit.to_string()),
                    ("x-ratelimit-remaining", "0".to_string()),
                    ("x-ratelimit-reset", decision.reset_at.timestamp().to_string()),
                ],
                Json(json!({
                    "error": RATE_LIMITED_MESSAGE,
                    "retryAfter": retry_after_secs,
                })),
            )
                .into_response(),
            GatewayOutcome::InvalidRequest { error, details } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": error, "details": details })),
            )
                .into_response(),
            GatewayOutcome::DeadlineExceeded { .. } => (
                StatusCode::REQUEST_TIMEOUT,
                Json(json!({ "error": DEADLINE_MESSAGE })),
            )
                .into_response(),
        }
    }
}

//! Application setup and server configuration.

use std::any::Any;

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::middleware::extract_client_ip;
use crate::server::routes::{
    extract_metadata_handler, extract_metadata_method_not_allowed, health_handler,
};

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error during metadata extraction";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: ServerDeps,
}

/// Router-level settings that come from deployment config.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    /// Key callers by X-Forwarded-For / X-Real-IP instead of the socket peer.
    pub trust_proxy_headers: bool,
}

/// Turn a handler panic into the JSON 500 body.
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": INTERNAL_ERROR_MESSAGE })),
    )
        .into_response()
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    if allowed_origins.is_empty() {
        return cors.allow_origin(AnyOrigin);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Build the Axum application router
pub fn build_app(deps: ServerDeps, options: &AppOptions) -> Router {
    let app_state = AppState { deps };
    let trust_proxy_headers = options.trust_proxy_headers;

    Router::new()
        .route(
            "/metadata/extract",
            post(extract_metadata_handler).get(extract_metadata_method_not_allowed),
        )
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(
            move |connect_info: Option<ConnectInfo<SocketAddr>>, request: Request, next: Next| {
                extract_client_ip(trust_proxy_headers, connect_info, request, next)
            },
        ))
        .layer(Extension(app_state))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors_layer(&options.allowed_origins))
        .layer(TraceLayer::new_for_http())
}

//! Router-level behavior: health, panics, CORS.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metadata_extractor::{ExtractionResult, Extractor, MockFetcher};
use server_core::domains::metadata::GatewayConfig;
use tower::ServiceExt;

use crate::common::{article_image, article_page, TestHarness, ARTICLE_URL};

/// Extractor that blows up, standing in for a programming error.
struct PanickingExtractor;

#[async_trait]
impl Extractor for PanickingExtractor {
    async fn extract(&self, _url: &str) -> ExtractionResult {
        panic!("extractor bug")
    }
}

#[tokio::test]
async fn test_health_reports_cache_entries() {
    let harness = TestHarness::new();
    harness.fetcher.add_get(article_page());
    harness.fetcher.add_head(article_image());

    let before = harness.get("/health").await;
    assert_eq!(before.status, StatusCode::OK);
    assert_eq!(before.body["status"], "healthy");
    assert_eq!(before.body["cacheEntries"], 0);

    harness.extract(ARTICLE_URL).await;

    let after = harness.get("/health").await;
    assert_eq!(after.body["cacheEntries"], 1);
}

#[tokio::test]
async fn test_panic_becomes_500() {
    let harness = TestHarness::with_extractor(
        Arc::new(PanickingExtractor),
        MockFetcher::new(),
        GatewayConfig::default(),
    );

    let response = harness.extract("https://boom.test/").await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body["error"],
        "Internal server error during metadata extraction"
    );

    // Nothing was cached, and the service keeps answering
    let health = harness.get("/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["cacheEntries"], 0);
}

#[tokio::test]
async fn test_cors_allows_any_origin_by_default() {
    let harness = TestHarness::new();
    let request = Request::builder()
        .uri("/health")
        .header("origin", "https://app.shelf.test")
        .body(Body::empty())
        .unwrap();

    let response = harness.app.clone().oneshot(request).await.unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

//! Integration tests for POST /metadata/extract.
//!
//! Drives the full router (ip middleware, gateway, cache, rate limiter,
//! extractor) with a mocked upstream and a mocked clock.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use metadata_extractor::{ExtractorConfig, FetchedResponse};
use server_core::domains::metadata::GatewayConfig;
use server_core::server::AppOptions;

use crate::common::{
    article_image, article_page, html_page, TestHarness, ARTICLE_IMAGE_URL, ARTICLE_URL,
};

// =============================================================================
// Success and cache hits
// =============================================================================

#[tokio::test]
async fn test_extracts_then_serves_from_cache() {
    let harness = TestHarness::new();
    harness.fetcher.add_get(article_page());
    harness.fetcher.add_head(article_image());

    let first = harness.extract(ARTICLE_URL).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["cached"], false);
    assert_eq!(first.body["message"], "Metadata extracted successfully");
    assert_eq!(first.body["metadata"]["title"], "Article");
    assert_eq!(first.body["metadata"]["description"], "Desc");
    assert_eq!(first.body["metadata"]["imageUrl"], ARTICLE_IMAGE_URL);
    assert!(first.body["extractedAt"].is_string());

    let second = harness.extract(ARTICLE_URL).await;

    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["cached"], true);
    assert_eq!(second.body["message"], "Metadata retrieved from cache");
    assert_eq!(second.body["metadata"], first.body["metadata"]);
    assert_eq!(second.body["extractedAt"], first.body["extractedAt"]);
    assert_eq!(harness.fetcher.get_call_count(), 1);
    assert_eq!(harness.fetcher.head_call_count(), 1);
}

#[tokio::test]
async fn test_success_cached_for_a_day() {
    let harness = TestHarness::new();
    harness.fetcher.add_get(article_page());
    harness.fetcher.add_head(article_image());

    harness.extract(ARTICLE_URL).await;
    harness.clock.advance(chrono::Duration::hours(23));
    assert_eq!(harness.extract(ARTICLE_URL).await.body["cached"], true);

    harness.clock.advance(chrono::Duration::hours(2));
    let refreshed = harness.extract(ARTICLE_URL).await;
    assert_eq!(refreshed.body["cached"], false);
    assert_eq!(harness.fetcher.get_call_count(), 2);
}

#[tokio::test]
async fn test_cache_key_is_the_request_url_as_sent() {
    let harness = TestHarness::new();
    harness.fetcher.add_get(article_page());
    harness.fetcher.add_head(article_image());

    harness.extract(ARTICLE_URL).await;
    let tracked = harness
        .extract("https://good-site.test/article?utm_source=newsletter")
        .await;

    // Same page upstream, but a different cache key
    assert_eq!(tracked.status, StatusCode::OK);
    assert_eq!(tracked.body["cached"], false);
    assert_eq!(harness.fetcher.get_call_count(), 2);
}

#[tokio::test]
async fn test_page_without_metadata_still_succeeds() {
    let harness = TestHarness::new();
    harness
        .fetcher
        .add_get(html_page("https://bare.test/", "<html><body>hi</body></html>"));

    let response = harness.extract("https://bare.test/").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["metadata"]["title"], "Untitled");
    assert_eq!(response.body["metadata"]["description"], "");
    assert_eq!(response.body["metadata"]["imageUrl"], serde_json::Value::Null);
    assert_eq!(
        response.body["metadata"]["favicon"],
        "https://bare.test/favicon.ico"
    );
}

// =============================================================================
// Request validation
// =============================================================================

#[tokio::test]
async fn test_malformed_bodies_are_rejected() {
    let harness = TestHarness::new();

    for body in ["not json", "[]", "{}", r#"{"url": 7}"#, r#"{"url": "not a url"}"#] {
        let response = harness.post_raw(body, Some("192.0.2.50")).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(response.body["error"], "Invalid request data");
        assert!(response.body["details"][0]["field"].is_string());
    }
    assert_eq!(harness.fetcher.get_call_count(), 0);
}

#[tokio::test]
async fn test_non_web_scheme_is_rejected_and_not_cached() {
    let harness = TestHarness::new();

    let response = harness.extract("ftp://files.example.com/a.txt").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["details"][0]["field"], "url");
    assert_eq!(response.body["details"][0]["message"], "URL must use http or https");
    assert_eq!(harness.get("/health").await.body["cacheEntries"], 0);
    assert_eq!(harness.fetcher.get_call_count(), 0);
}

#[tokio::test]
async fn test_get_is_method_not_allowed() {
    let harness = TestHarness::new();

    let response = harness.get("/metadata/extract").await;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .starts_with("Method not allowed"));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_http_error_is_422_and_replayed_from_cache() {
    let harness = TestHarness::new();
    harness.fetcher.add_get(
        FetchedResponse::new("https://www.broken.test/", 404).with_content_type("text/html"),
    );

    let first = harness.extract("https://www.broken.test/").await;

    assert_eq!(first.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(first.body["error"], "HTTP 404: Not Found");
    assert_eq!(first.body["url"], "https://www.broken.test/");
    assert_eq!(first.body["cached"], false);
    assert_eq!(first.body["fallbackData"]["title"], "broken.test");
    assert_eq!(
        first.body["fallbackData"]["favicon"],
        "https://www.broken.test/favicon.ico"
    );

    let second = harness.extract("https://www.broken.test/").await;

    assert_eq!(second.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(second.body["cached"], true);
    assert_eq!(second.body["error"], first.body["error"]);
    assert_eq!(harness.fetcher.get_call_count(), 1);
}

#[tokio::test]
async fn test_non_html_is_422() {
    let harness = TestHarness::new();
    harness.fetcher.add_get(
        FetchedResponse::new("https://api.test/data.json", 200)
            .with_content_type("application/json"),
    );

    let response = harness.extract("https://api.test/data.json").await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["error"], "URL does not point to an HTML page");
}

#[tokio::test]
async fn test_unreachable_is_503() {
    let harness = TestHarness::new();
    harness.fetcher.unreachable_get("https://gone.test/", "connection refused");

    let response = harness.extract("https://gone.test/").await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.body["error"].is_string());
    assert_eq!(response.body["fallbackData"]["siteName"], "gone.test");
}

#[tokio::test]
async fn test_failure_expires_after_five_minutes() {
    let harness = TestHarness::new();
    harness.fetcher.add_get(
        FetchedResponse::new("https://flaky.test/", 500).with_content_type("text/html"),
    );

    harness.extract("https://flaky.test/").await;
    harness.clock.advance(chrono::Duration::minutes(4));
    assert_eq!(harness.extract("https://flaky.test/").await.body["cached"], true);

    harness.clock.advance(chrono::Duration::minutes(2));
    let retried = harness.extract("https://flaky.test/").await;
    assert_eq!(retried.body["cached"], false);
    assert_eq!(harness.fetcher.get_call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_page_timeout_is_408_with_fallback() {
    let harness = TestHarness::with_config(
        GatewayConfig::default(),
        ExtractorConfig {
            page_timeout: Duration::from_secs(2),
            ..Default::default()
        },
    );
    harness.fetcher.hang_get("https://slow.test/");

    let response = harness.extract("https://slow.test/").await;

    assert_eq!(response.status, StatusCode::REQUEST_TIMEOUT);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .to_lowercase()
        .contains("timeout"));
    assert_eq!(response.body["fallbackData"]["title"], "slow.test");
    assert_eq!(harness.fetcher.abandoned_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_deadline_is_408_and_not_cached() {
    let harness = TestHarness::with_config(
        GatewayConfig {
            request_timeout: Duration::from_secs(3),
            ..Default::default()
        },
        ExtractorConfig::default(),
    );
    harness.fetcher.hang_get("https://slow.test/");

    let response = harness.extract("https://slow.test/").await;

    assert_eq!(response.status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(harness.fetcher.abandoned_count(), 1);

    let health = harness.get("/health").await;
    assert_eq!(health.body["cacheEntries"], 0);
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_thirty_first_request_is_429() {
    let harness = TestHarness::new();
    harness.fetcher.add_get(article_page());
    harness.fetcher.add_head(article_image());

    for _ in 0..30 {
        assert_eq!(harness.extract(ARTICLE_URL).await.status, StatusCode::OK);
    }

    let limited = harness.extract(ARTICLE_URL).await;

    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["retryAfter"], 60);
    assert_eq!(limited.header("retry-after"), Some("60"));
    assert_eq!(limited.header("x-ratelimit-limit"), Some("30"));
    assert_eq!(limited.header("x-ratelimit-remaining"), Some("0"));
    let reset: i64 = limited.header("x-ratelimit-reset").unwrap().parse().unwrap();
    assert!(reset > harness.deps.clock.now().timestamp());
}

#[tokio::test]
async fn test_rate_limit_applies_before_validation() {
    let harness = TestHarness::with_config(
        GatewayConfig {
            rate_limit_max_requests: 2,
            ..Default::default()
        },
        ExtractorConfig::default(),
    );

    harness.post_raw("{}", Some("192.0.2.1")).await;
    harness.post_raw("{}", Some("192.0.2.1")).await;
    let limited = harness.post_raw("{}", Some("192.0.2.1")).await;

    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_callers_are_limited_separately() {
    let harness = TestHarness::with_config(
        GatewayConfig {
            rate_limit_max_requests: 1,
            ..Default::default()
        },
        ExtractorConfig::default(),
    );
    harness.fetcher.add_get(article_page());
    harness.fetcher.add_head(article_image());

    assert_eq!(
        harness.post_raw(&article_body(), Some("192.0.2.1")).await.status,
        StatusCode::OK
    );
    assert_eq!(
        harness.post_raw(&article_body(), Some("192.0.2.1")).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        harness.post_raw(&article_body(), Some("192.0.2.2")).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_requests_without_client_address_share_a_bucket() {
    let harness = TestHarness::with_config(
        GatewayConfig {
            rate_limit_max_requests: 1,
            ..Default::default()
        },
        ExtractorConfig::default(),
    );

    harness.post_raw("{}", None).await;
    let limited = harness.post_raw("{}", None).await;

    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_reset_the_limit() {
    let harness = TestHarness::with_config(
        GatewayConfig {
            rate_limit_max_requests: 1,
            ..Default::default()
        },
        ExtractorConfig::default(),
    );

    let mut limited = 0;
    for i in 0..50 {
        let forwarded = format!("203.0.113.{}", i + 1);
        let response = harness.post_forwarded("{}", "192.0.2.1", &forwarded).await;
        if response.status == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }

    assert_eq!(limited, 49);
}

#[tokio::test]
async fn test_trusted_proxy_headers_identify_callers() {
    let harness = TestHarness::with_options(
        GatewayConfig {
            rate_limit_max_requests: 1,
            ..Default::default()
        },
        AppOptions {
            trust_proxy_headers: true,
            ..Default::default()
        },
    );

    let first = harness.post_forwarded("{}", "10.0.0.2", "198.51.100.1").await;
    let same_client = harness.post_forwarded("{}", "10.0.0.2", "198.51.100.1").await;
    let other_client = harness.post_forwarded("{}", "10.0.0.2", "198.51.100.2").await;

    assert_eq!(first.status, StatusCode::BAD_REQUEST);
    assert_eq!(same_client.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(other_client.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_window_resets_after_a_minute() {
    let harness = TestHarness::with_config(
        GatewayConfig {
            rate_limit_max_requests: 1,
            ..Default::default()
        },
        ExtractorConfig::default(),
    );

    harness.post_raw("{}", Some("192.0.2.1")).await;
    assert_eq!(
        harness.post_raw("{}", Some("192.0.2.1")).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    harness.clock.advance(chrono::Duration::seconds(61));

    assert_eq!(
        harness.post_raw("{}", Some("192.0.2.1")).await.status,
        StatusCode::BAD_REQUEST
    );
}

fn article_body() -> String {
    serde_json::json!({ "url": ARTICLE_URL }).to_string()
}

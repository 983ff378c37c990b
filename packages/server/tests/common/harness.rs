//! Test harness driving the axum router in-process.
//!
//! Every harness gets its own `MockFetcher` and `MockClock`, so cache and
//! rate-limit state never leaks between tests.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use metadata_extractor::{Extractor, ExtractorConfig, MetadataExtractor, MockFetcher};
use serde_json::Value;
use server_core::domains::metadata::GatewayConfig;
use server_core::kernel::{MockClock, ServerDeps};
use server_core::server::{build_app, AppOptions};
use tower::ServiceExt;

/// Client address used unless a test sets its own.
pub const DEFAULT_CLIENT_IP: &str = "198.51.100.20";

pub struct TestHarness {
    pub app: Router,
    pub deps: ServerDeps,
    pub fetcher: MockFetcher,
    pub clock: MockClock,
}

/// Status, headers and parsed JSON body of one response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

fn init_tracing() {
    // Run tests with: RUST_LOG=debug cargo test -- --nocapture
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::default(), ExtractorConfig::default())
    }

    pub fn with_config(gateway: GatewayConfig, extractor: ExtractorConfig) -> Self {
        let fetcher = MockFetcher::new();
        let extractor = Arc::new(MetadataExtractor::with_config(fetcher.clone(), extractor));
        Self::with_extractor(extractor, fetcher, gateway)
    }

    /// Like `with_config`, but with router options such as trusted proxy headers.
    pub fn with_options(gateway: GatewayConfig, options: AppOptions) -> Self {
        let fetcher = MockFetcher::new();
        let extractor = Arc::new(MetadataExtractor::new(fetcher.clone()));
        Self::build(extractor, fetcher, gateway, &options)
    }

    /// Build around any extractor; `fetcher` is only kept for assertions.
    pub fn with_extractor(
        extractor: Arc<dyn Extractor>,
        fetcher: MockFetcher,
        gateway: GatewayConfig,
    ) -> Self {
        Self::build(extractor, fetcher, gateway, &AppOptions::default())
    }

    fn build(
        extractor: Arc<dyn Extractor>,
        fetcher: MockFetcher,
        gateway: GatewayConfig,
        options: &AppOptions,
    ) -> Self {
        init_tracing();

        let clock = MockClock::default();
        let deps = ServerDeps::in_memory(extractor, Arc::new(clock.clone()), gateway);
        let app = build_app(deps.clone(), options);

        Self {
            app,
            deps,
            fetcher,
            clock,
        }
    }

    /// POST `{"url": url}` from the default client.
    pub async fn extract(&self, url: &str) -> TestResponse {
        let body = serde_json::json!({ "url": url }).to_string();
        self.post_raw(&body, Some(DEFAULT_CLIENT_IP)).await
    }

    /// POST an arbitrary body, optionally from a connected peer address.
    pub async fn post_raw(&self, body: &str, client_ip: Option<&str>) -> TestResponse {
        self.post_from(body, client_ip, None).await
    }

    /// POST from `peer_ip` carrying a client-supplied `X-Forwarded-For`.
    pub async fn post_forwarded(
        &self,
        body: &str,
        peer_ip: &str,
        forwarded_for: &str,
    ) -> TestResponse {
        self.post_from(body, Some(peer_ip), Some(forwarded_for))
            .await
    }

    async fn post_from(
        &self,
        body: &str,
        peer_ip: Option<&str>,
        forwarded_for: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/metadata/extract")
            .header("content-type", "application/json");
        if let Some(forwarded) = forwarded_for {
            builder = builder.header("x-forwarded-for", forwarded);
        }
        let mut request = builder.body(Body::from(body.to_string())).unwrap();
        if let Some(ip) = peer_ip {
            let ip: IpAddr = ip.parse().unwrap();
            request
                .extensions_mut()
                .insert(ConnectInfo(SocketAddr::new(ip, 40_000)));
        }
        self.send(request).await
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

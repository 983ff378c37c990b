//! Mock fetcher for testing.
//!
//! Provides a configurable mock implementation of the PageFetcher trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::{FetchedResponse, PageFetcher};

/// Canned behavior for one URL.
#[derive(Debug, Clone)]
enum MockOutcome {
    Respond(FetchedResponse),
    Unreachable(String),
    Timeout,
    Hang,
}

/// Mock fetcher for testing.
///
/// Allows configuring canned responses for GET and HEAD, and records every
/// call. Unknown URLs fail as unreachable. Clones share state, so a test can
/// keep a handle while the extractor owns another.
///
/// # Example
///
/// ```rust
/// use metadata_extractor::fetchers::MockFetcher;
/// use metadata_extractor::FetchedResponse;
///
/// let mock = MockFetcher::new();
/// mock.add_get(
///     FetchedResponse::new("https://example.com/", 200)
///         .with_content_type("text/html")
///         .with_body("<title>Hello</title>"),
/// );
/// assert_eq!(mock.get_call_count(), 0);
/// ```
#[derive(Default)]
pub struct MockFetcher {
    gets: Arc<RwLock<HashMap<String, MockOutcome>>>,
    heads: Arc<RwLock<HashMap<String, MockOutcome>>>,
    get_calls: Arc<RwLock<Vec<String>>>,
    head_calls: Arc<RwLock<Vec<String>>>,
    /// Hanging requests that were dropped before completing
    abandoned: Arc<AtomicUsize>,
}

impl Clone for MockFetcher {
    fn clone(&self) -> Self {
        Self {
            gets: Arc::clone(&self.gets),
            heads: Arc::clone(&self.heads),
            get_calls: Arc::clone(&self.get_calls),
            head_calls: Arc::clone(&self.head_calls),
            abandoned: Arc::clone(&self.abandoned),
        }
    }
}

impl MockFetcher {
    /// Create a new empty mock fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer GETs for `response.url` with `response`.
    pub fn add_get(&self, response: FetchedResponse) {
        let url = response.url.clone();
        self.add_get_for(&url, response);
    }

    /// Answer GETs for `url` with `response` (whose URL may differ, as after
    /// a redirect).
    pub fn add_get_for(&self, url: &str, response: FetchedResponse) {
        self.gets
            .write()
            .unwrap()
            .insert(url.to_string(), MockOutcome::Respond(response));
    }

    /// Answer HEADs for `response.url` with `response`.
    pub fn add_head(&self, response: FetchedResponse) {
        self.heads
            .write()
            .unwrap()
            .insert(response.url.clone(), MockOutcome::Respond(response));
    }

    /// Make GETs for `url` fail with a connect error.
    pub fn unreachable_get(&self, url: &str, reason: &str) {
        self.gets
            .write()
            .unwrap()
            .insert(url.to_string(), MockOutcome::Unreachable(reason.to_string()));
    }

    /// Make GETs for `url` report a timeout immediately.
    pub fn timeout_get(&self, url: &str) {
        self.gets
            .write()
            .unwrap()
            .insert(url.to_string(), MockOutcome::Timeout);
    }

    /// Make GETs for `url` never complete.
    pub fn hang_get(&self, url: &str) {
        self.gets
            .write()
            .unwrap()
            .insert(url.to_string(), MockOutcome::Hang);
    }

    /// Make HEADs for `url` never complete.
    pub fn hang_head(&self, url: &str) {
        self.heads
            .write()
            .unwrap()
            .insert(url.to_string(), MockOutcome::Hang);
    }

    /// Get the number of GET requests made.
    pub fn get_call_count(&self) -> usize {
        self.get_calls.read().unwrap().len()
    }

    /// Get the URLs requested via GET.
    pub fn get_calls(&self) -> Vec<String> {
        self.get_calls.read().unwrap().clone()
    }

    /// Get the number of HEAD requests made.
    pub fn head_call_count(&self) -> usize {
        self.head_calls.read().unwrap().len()
    }

    /// Get the URLs requested via HEAD.
    pub fn head_calls(&self) -> Vec<String> {
        self.head_calls.read().unwrap().clone()
    }

    /// Number of hanging requests that were cancelled by their caller.
    pub fn abandoned_count(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    /// Clear all recorded calls.
    pub fn reset_calls(&self) {
        self.get_calls.write().unwrap().clear();
        self.head_calls.write().unwrap().clear();
    }

    async fn play(&self, outcome: Option<MockOutcome>, url: &str) -> FetchResult<FetchedResponse> {
        match outcome {
            Some(MockOutcome::Respond(response)) => Ok(response),
            Some(MockOutcome::Unreachable(reason)) => Err(FetchError::Unreachable {
                url: url.to_string(),
                reason,
            }),
            Some(MockOutcome::Timeout) => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
            Some(MockOutcome::Hang) => {
                let _guard = AbandonGuard(Arc::clone(&self.abandoned));
                std::future::pending::<()>().await;
                unreachable!("pending never resolves")
            }
            None => Err(FetchError::Unreachable {
                url: url.to_string(),
                reason: "no mock response configured".to_string(),
            }),
        }
    }
}

/// Counts a hanging request as abandoned when its future is dropped.
struct AbandonGuard(Arc<AtomicUsize>);

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn get(&self, url: &str, _timeout: Duration) -> FetchResult<FetchedResponse> {
        self.get_calls.write().unwrap().push(url.to_string());
        let outcome = self.gets.read().unwrap().get(url).cloned();
        self.play(outcome, url).await
    }

    async fn head(&self, url: &str, _timeout: Duration) -> FetchResult<FetchedResponse> {
        self.head_calls.write().unwrap().push(url.to_string());
        let outcome = self.heads.read().unwrap().get(url).cloned();
        self.play(outcome, url).await
    }

    fn name(&self) -> &str {
        "mock"
    }
}

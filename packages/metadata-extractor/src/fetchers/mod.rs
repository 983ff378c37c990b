//! Fetcher implementations.
//!
//! # Available Fetchers
//!
//! - `HttpFetcher` - reqwest with redirects, timeouts and a body cap
//! - `MockFetcher` - For testing
//!
//! Wrap either in [`ValidatedFetcher`] to get SSRF protection.

mod http;
mod mock;

pub use http::{HttpFetcher, DEFAULT_MAX_PAGE_BYTES, DEFAULT_USER_AGENT};
pub use mock::MockFetcher;

// Re-export from traits for convenience
pub use crate::traits::fetcher::{FetchedResponse, PageFetcher, ValidatedFetcher};

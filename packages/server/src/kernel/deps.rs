//! Server dependencies (using traits for testability)
//!
//! Everything the metadata gateway touches goes through a trait object here,
//! so tests swap in a `MockFetcher`-backed extractor and a `MockClock`.

use metadata_extractor::Extractor;
use std::sync::Arc;

use super::cache::{MemoryMetadataCache, MetadataCache};
use super::clock::{Clock, SystemClock};
use super::rate_limit::{FixedWindowRateLimiter, RateLimiter};
use crate::domains::metadata::GatewayConfig;

/// Shared dependencies of the request handlers
#[derive(Clone)]
pub struct ServerDeps {
    pub extractor: Arc<dyn Extractor>,
    pub cache: Arc<dyn MetadataCache>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub clock: Arc<dyn Clock>,
    pub gateway: GatewayConfig,
}

impl ServerDeps {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        cache: Arc<dyn MetadataCache>,
        rate_limiter: Arc<dyn RateLimiter>,
        clock: Arc<dyn Clock>,
        gateway: GatewayConfig,
    ) -> Self {
        Self {
            extractor,
            cache,
            rate_limiter,
            clock,
            gateway,
        }
    }

    /// In-memory cache and fixed-window limiter driven by `clock`.
    pub fn in_memory(
        extractor: Arc<dyn Extractor>,
        clock: Arc<dyn Clock>,
        gateway: GatewayConfig,
    ) -> Self {
        let cache = Arc::new(MemoryMetadataCache::new(
            gateway.cache_max_entries,
            clock.clone(),
        ));
        let rate_limiter = Arc::new(
            FixedWindowRateLimiter::new(
                gateway.rate_limit_max_requests,
                gateway.rate_limit_window,
                clock.clone(),
            )
            .with_sweep_threshold(gateway.rate_limit_sweep_threshold),
        );
        Self::new(extractor, cache, rate_limiter, clock, gateway)
    }

    /// In-memory stores on the real clock.
    pub fn with_system_clock(extractor: Arc<dyn Extractor>, gateway: GatewayConfig) -> Self {
        Self::in_memory(extractor, Arc::new(SystemClock), gateway)
    }
}

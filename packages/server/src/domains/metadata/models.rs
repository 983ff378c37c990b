use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::kernel::rate_limit::DEFAULT_SWEEP_THRESHOLD;
use crate::kernel::{CachedExtraction, RateLimitDecision};

/// Gateway limits and TTLs.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub rate_limit_max_requests: u32,
    pub rate_limit_window: Duration,
    /// Tracked callers above which expired rate-limit windows are dropped.
    pub rate_limit_sweep_threshold: usize,
    pub success_ttl: Duration,
    pub failure_ttl: Duration,
    pub cache_max_entries: usize,
    /// Outer deadline for one extraction, covering the page fetch and
    /// image validation together.
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rate_limit_max_requests: 30,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
            success_ttl: Duration::from_secs(24 * 60 * 60),
            failure_ttl: Duration::from_secs(5 * 60),
            cache_max_entries: 10_000,
            request_timeout: Duration::from_secs(20),
        }
    }
}

/// Body of `POST /metadata/extract`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRequest {
    pub url: String,
}

/// One request validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Everything a metadata request can end in.
#[derive(Debug, Clone)]
pub enum GatewayOutcome {
    /// Extraction ran (or was replayed from cache).
    Completed {
        extraction: CachedExtraction,
        cached: bool,
    },
    RateLimited {
        decision: RateLimitDecision,
        retry_after_secs: u64,
    },
    InvalidRequest {
        error: String,
        details: Vec<FieldError>,
    },
    /// The outer request deadline fired before the extractor finished.
    DeadlineExceeded { url: String },
}

//! Per-caller fixed-window rate limiting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::clock::Clock;

pub const DEFAULT_MAX_REQUESTS: u32 = 30;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Number of tracked callers above which expired windows are swept.
pub const DEFAULT_SWEEP_THRESHOLD: usize = 10_000;

/// Outcome of one rate-limit check, with what a 429 response needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, at least 1 when rejected.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000).max(1)
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request for `caller_id` and decide whether it may proceed.
    async fn check_rate_limit(&self, caller_id: &str) -> RateLimitDecision;
}

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Counter that resets entirely once a caller's window has passed.
pub struct FixedWindowRateLimiter {
    max_requests: u32,
    window: chrono::Duration,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, RateLimitWindow>>,
    sweep_threshold: usize,
}

impl FixedWindowRateLimiter {
    pub fn new(max_requests: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests,
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::seconds(60)),
            clock,
            windows: Mutex::new(HashMap::new()),
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
        }
    }

    /// Sweep expired windows once more than `threshold` callers are tracked.
    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold.max(1);
        self
    }

    fn sweep_expired(windows: &mut HashMap<String, RateLimitWindow>, now: DateTime<Utc>) {
        let before = windows.len();
        windows.retain(|_, window| now <= window.reset_at);
        debug!(
            swept = before - windows.len(),
            tracked = windows.len(),
            "Swept expired rate limit windows"
        );
    }

    #[cfg(test)]
    fn tracked_callers(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl RateLimiter for FixedWindowRateLimiter {
    async fn check_rate_limit(&self, caller_id: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if windows.len() >= self.sweep_threshold && !windows.contains_key(caller_id) {
            Self::sweep_expired(&mut windows, now);
        }

        let window = windows
            .entry(caller_id.to_string())
            .or_insert(RateLimitWindow {
                count: 0,
                reset_at: now,
            });

        if window.count == 0 || now > window.reset_at {
            *window = RateLimitWindow {
                count: 1,
                reset_at: now + self.window,
            };
            return RateLimitDecision {
                allowed: true,
                limit: self.max_requests,
                remaining: self.max_requests.saturating_sub(1),
                reset_at: window.reset_at,
            };
        }

        if window.count >= self.max_requests {
            debug!(caller = %caller_id, count = window.count, "Rate limit exceeded");
            return RateLimitDecision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                reset_at: window.reset_at,
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            limit: self.max_requests,
            remaining: self.max_requests - window.count,
            reset_at: window.reset_at,
        }
    }
}

//! Kernel module - server infrastructure and dependencies.

pub mod cache;
pub mod clock;
pub mod deps;
pub mod rate_limit;

pub use cache::{CacheError, CacheResult, CachedExtraction, MemoryMetadataCache, MetadataCache};
pub use clock::{Clock, MockClock, SystemClock};
pub use deps::ServerDeps;
pub use rate_limit::{FixedWindowRateLimiter, RateLimitDecision, RateLimiter};

// Shelf metadata server - API core
//
// Rate-limited, cached link metadata extraction over HTTP. The extraction
// itself lives in the metadata-extractor package; this crate adds the
// gateway (rate limiting, result cache, status mapping) and the axum app.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;

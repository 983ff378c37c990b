//! Metadata domain - rate-limited, cached link metadata extraction

pub mod activities;
pub mod models;

pub use activities::{extract_metadata, parse_extract_request};
pub use models::{ExtractRequest, FieldError, GatewayConfig, GatewayOutcome};

//! Link Metadata Extraction
//!
//! Turns a saved URL into the title, description, preview image, favicon,
//! site name, author and publish date shown on a bookmark card.
//!
//! # Design
//!
//! - No DOM: pages are scanned with tolerant regexes, so broken markup
//!   degrades individual fields instead of failing the extraction
//! - Every field has a fixed fallback chain (Open Graph, then Twitter, then
//!   plain HTML)
//! - Preview images are only returned after a HEAD request confirms they are
//!   real, reasonably sized images
//! - Network access goes through [`PageFetcher`], so callers pick the
//!   transport and tests count calls
//!
//! # Usage
//!
//! ```rust,ignore
//! use metadata_extractor::{HttpFetcher, MetadataExtractor, ValidatedFetcher};
//!
//! let fetcher = ValidatedFetcher::new(HttpFetcher::new()?);
//! let extractor = MetadataExtractor::new(fetcher);
//!
//! match extractor.extract_metadata("https://example.com/article").await {
//!     ExtractionResult::Success { metadata } => println!("{}", metadata.title),
//!     ExtractionResult::Failure(failure) => println!("{}", failure.error),
//! }
//! ```
//!
//! # Modules
//!
//! - [`normalize`] - URL validation and tracking-parameter removal
//! - [`html`] - Field parsing helpers
//! - [`extractor`] - The extraction flow and image validation
//! - [`traits`] - The fetch abstraction and SSRF validation
//! - [`fetchers`] - HTTP and mock fetchers

pub mod error;
pub mod extractor;
pub mod fetchers;
pub mod html;
pub mod normalize;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{FetchError, SecurityError, UrlError};
pub use extractor::{Extractor, ExtractorConfig, MetadataExtractor};
pub use fetchers::{HttpFetcher, MockFetcher};
pub use normalize::{sanitize_url, validate_url, validate_web_url, TRACKING_PARAMS};
pub use traits::fetcher::{FetchedResponse, PageFetcher, UrlValidator, ValidatedFetcher};
pub use types::{
    ExtractedMetadata, ExtractionFailure, ExtractionResult, FailureKind, PartialMetadata,
};

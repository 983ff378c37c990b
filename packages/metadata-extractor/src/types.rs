//! Value types produced by the extractor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title used when a page exposes no title-bearing tag.
pub const UNTITLED: &str = "Untitled";

/// Embeddable metadata for one page.
///
/// `title` is never empty; every other field degrades to an empty string or
/// `None` when the page does not provide it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMetadata {
    pub title: String,
    pub description: String,
    /// Absolute URL; never verified to exist
    pub favicon: Option<String>,
    /// Absolute URL of a preview image that passed validation
    pub image_url: Option<String>,
    pub site_name: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Default for ExtractedMetadata {
    fn default() -> Self {
        Self {
            title: UNTITLED.to_string(),
            description: String::new(),
            favicon: None,
            image_url: None,
            site_name: None,
            author: None,
            published_at: None,
        }
    }
}

/// A subset of [`ExtractedMetadata`] offered alongside a failure so the user
/// can finish the bookmark by hand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
}

/// Why an extraction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Input could not be turned into an http(s) URL; no request was made
    InvalidUrl,
    /// The page did not answer before the fetch deadline
    Timeout,
    /// DNS or connect failure
    Unreachable,
    /// Any other transport failure, including blocked destinations
    Network,
    /// The page answered with a non-2xx status
    HttpStatus,
    /// The page answered with something other than HTML
    NotHtml,
}

/// A failed extraction with an optional best-effort fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionFailure {
    pub error: String,
    pub kind: FailureKind,
    pub fallback_data: Option<PartialMetadata>,
}

impl ExtractionFailure {
    pub fn new(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind,
            fallback_data: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Option<PartialMetadata>) -> Self {
        self.fallback_data = fallback;
        self
    }
}

/// Outcome of [`crate::Extractor::extract`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    Success { metadata: ExtractedMetadata },
    Failure(ExtractionFailure),
}

impl ExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The metadata on success.
    pub fn metadata(&self) -> Option<&ExtractedMetadata> {
        match self {
            Self::Success { metadata } => Some(metadata),
            Self::Failure(_) => None,
        }
    }

    /// The failure details on failure.
    pub fn failure(&self) -> Option<&ExtractionFailure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

impl From<ExtractionFailure> for ExtractionResult {
    fn from(failure: ExtractionFailure) -> Self {
        Self::Failure(failure)
    }
}

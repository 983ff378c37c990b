//! Metadata extraction from a single URL.
//!
//! Flow:
//! 1. Sanitize the URL (no network access if that fails)
//! 2. GET the page under a hard deadline
//! 3. Reject non-2xx and non-HTML responses
//! 4. Parse each field through its fallback chain
//! 5. HEAD the chosen preview image and keep it only if it checks out
//!
//! Recoverable problems never escape as errors: they become
//! [`ExtractionResult::Failure`] or a defaulted field.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::FetchError;
use crate::html;
use crate::normalize::{origin_of, sanitize_url};
use crate::traits::fetcher::{FetchedResponse, PageFetcher};
use crate::types::{
    ExtractedMetadata, ExtractionFailure, ExtractionResult, FailureKind, PartialMetadata, UNTITLED,
};

pub const INVALID_URL_MESSAGE: &str = "Invalid URL format";
pub const NOT_HTML_MESSAGE: &str = "URL does not point to an HTML page";
pub const TIMEOUT_MESSAGE: &str = "Request timeout: the site took too long to respond";

/// Deadlines and limits for one extraction.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Deadline for the page GET
    pub page_timeout: Duration,

    /// Deadline for the preview image HEAD
    pub image_timeout: Duration,

    /// Largest acceptable advertised image size
    pub max_image_bytes: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(10),
            image_timeout: Duration::from_secs(5),
            max_image_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Anything that can turn a URL into metadata.
///
/// The gateway depends on this rather than on [`MetadataExtractor`] so it can
/// hold a trait object.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, url: &str) -> ExtractionResult;
}

/// The default extractor, generic over how it reaches the network.
pub struct MetadataExtractor<F: PageFetcher> {
    fetcher: F,
    config: ExtractorConfig,
}

impl<F: PageFetcher> MetadataExtractor<F> {
    /// Create an extractor with default deadlines.
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, ExtractorConfig::default())
    }

    /// Create an extractor with custom deadlines.
    pub fn with_config(fetcher: F, config: ExtractorConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Fetch `url` and extract its metadata.
    pub async fn extract_metadata(&self, url: &str) -> ExtractionResult {
        let started = Instant::now();

        let page_url = match sanitize_url(url)
            .ok()
            .and_then(|s| Url::parse(&s).ok())
            .filter(|u| matches!(u.scheme(), "http" | "https"))
        {
            Some(u) => u,
            None => {
                debug!(url = %url, "Rejected invalid URL");
                return ExtractionFailure::new(FailureKind::InvalidUrl, INVALID_URL_MESSAGE).into();
            }
        };

        let response = match self.fetch_page(page_url.as_str()).await {
            Ok(response) => response,
            Err(failure) => {
                warn!(
                    url = %page_url,
                    kind = ?failure.kind,
                    error = %failure.error,
                    "Metadata extraction failed"
                );
                return failure.with_fallback(Some(fallback_for(&page_url))).into();
            }
        };

        // Relative references resolve against where we actually landed
        let base = Url::parse(&response.url).unwrap_or_else(|_| page_url.clone());
        let metadata = self.parse_metadata(&response.body, &base).await;

        info!(
            url = %page_url,
            title = %metadata.title,
            has_image = metadata.image_url.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Metadata extracted"
        );

        ExtractionResult::Success { metadata }
    }

    /// GET the page and apply the status and content-type gates.
    async fn fetch_page(&self, url: &str) -> Result<FetchedResponse, ExtractionFailure> {
        let timeout = self.config.page_timeout;

        // Dropping the fetch future on expiry cancels the in-flight request
        let response = match tokio::time::timeout(timeout, self.fetcher.get(url, timeout)).await {
            Err(_elapsed) => {
                return Err(ExtractionFailure::new(FailureKind::Timeout, TIMEOUT_MESSAGE))
            }
            Ok(Err(e)) => return Err(failure_from_fetch_error(e)),
            Ok(Ok(response)) => response,
        };

        if !response.is_success() {
            return Err(ExtractionFailure::new(
                FailureKind::HttpStatus,
                format!("HTTP {}: {}", response.status, response.status_text)
                    .trim_end()
                    .to_string(),
            ));
        }

        if !response.is_html() {
            return Err(ExtractionFailure::new(FailureKind::NotHtml, NOT_HTML_MESSAGE));
        }

        Ok(response)
    }

    async fn parse_metadata(&self, body: &str, base: &Url) -> ExtractedMetadata {
        let title = html::first_meta(body, &["og:title", "twitter:title"])
            .or_else(|| html::title_tag(body))
            .unwrap_or_else(|| UNTITLED.to_string());

        let description =
            html::first_meta(body, &["og:description", "twitter:description", "description"])
                .unwrap_or_default();

        let favicon = html::icon_link(body)
            .and_then(|href| html::resolve(base, &href))
            .unwrap_or_else(|| format!("{}/favicon.ico", origin_of(base)));

        let site_name = html::first_meta(body, &["og:site_name", "application-name"]);
        let author = html::first_meta(body, &["author", "article:author"]);
        let published_at = html::first_meta(
            body,
            &["article:published_time", "datePublished", "date"],
        )
        .and_then(|raw| html::parse_timestamp(&raw));

        let image_url = match html::first_meta(
            body,
            &["og:image", "twitter:image", "twitter:image:src"],
        )
        .or_else(|| html::first_content_image(body))
        .and_then(|src| html::resolve(base, &src))
        {
            Some(candidate) if self.validate_image_url(&candidate).await => Some(candidate),
            Some(candidate) => {
                debug!(image = %candidate, "Preview image rejected");
                None
            }
            None => None,
        };

        ExtractedMetadata {
            title,
            description,
            favicon: Some(favicon),
            image_url,
            site_name,
            author,
            published_at,
        }
    }

    /// Check that `url` serves a reasonably sized image.
    ///
    /// Accepts only a 2xx answer with an `image/*` content type and, when a
    /// `Content-Length` is present, a size within the configured limit. Every
    /// failure, including timeouts, is a plain `false`.
    pub async fn validate_image_url(&self, url: &str) -> bool {
        if !Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https")) {
            return false;
        }

        let timeout = self.config.image_timeout;
        let response = match tokio::time::timeout(timeout, self.fetcher.head(url, timeout)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                debug!(image = %url, error = %e, "Image HEAD failed");
                return false;
            }
            Err(_) => {
                debug!(image = %url, "Image HEAD timed out");
                return false;
            }
        };

        if !response.is_success() {
            return false;
        }

        let is_image = response
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"));
        if !is_image {
            return false;
        }

        match response.content_length.as_deref() {
            None => true,
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .is_ok_and(|len| len <= self.config.max_image_bytes),
        }
    }
}

#[async_trait]
impl<F: PageFetcher> Extractor for MetadataExtractor<F> {
    async fn extract(&self, url: &str) -> ExtractionResult {
        self.extract_metadata(url).await
    }
}

fn failure_from_fetch_error(err: FetchError) -> ExtractionFailure {
    match err {
        FetchError::Timeout { .. } => ExtractionFailure::new(FailureKind::Timeout, TIMEOUT_MESSAGE),
        FetchError::Unreachable { .. } => {
            ExtractionFailure::new(FailureKind::Unreachable, err.to_string())
        }
        FetchError::Security(_) | FetchError::Http(_) => {
            ExtractionFailure::new(FailureKind::Network, err.to_string())
        }
    }
}

/// Minimal metadata derivable from the URL alone.
fn fallback_for(url: &Url) -> PartialMetadata {
    let host = url.host_str().unwrap_or_default();
    let bare_host = host.strip_prefix("www.").unwrap_or(host);

    PartialMetadata {
        title: Some(bare_host.to_string()),
        favicon: Some(format!("{}/favicon.ico", origin_of(url))),
        site_name: Some(bare_host.to_string()),
        ..Default::default()
    }
}

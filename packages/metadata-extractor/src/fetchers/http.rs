//! HTTP-based fetcher implementation.
//!
//! Thin reqwest wrapper: the request-level timeout aborts the in-flight
//! request, and page bodies are streamed with a hard byte cap.

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE,
};
use reqwest::redirect::Policy;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult, SecurityError};
use crate::traits::fetcher::{is_html_content_type, FetchedResponse, PageFetcher, UrlValidator};

/// User-Agent sent to remote sites unless overridden.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; ShelfMetadataBot/1.0; +https://github.com/shelf-app/shelf)";

/// Default cap on bytes read from one page.
pub const DEFAULT_MAX_PAGE_BYTES: usize = 5 * 1024 * 1024;

const MAX_REDIRECTS: usize = 10;

/// HTTP fetcher backed by a shared reqwest client.
///
/// # Example
///
/// ```rust,ignore
/// use metadata_extractor::fetchers::HttpFetcher;
///
/// let fetcher = HttpFetcher::new()?.with_max_page_bytes(1024 * 1024);
///
/// // Refuse to follow redirects into private networks
/// let guarded = HttpFetcher::with_redirect_guard(DEFAULT_USER_AGENT, UrlValidator::new())?;
/// ```
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_page_bytes: usize,
}

impl HttpFetcher {
    /// Create a fetcher with the default crawler User-Agent.
    pub fn new() -> FetchResult<Self> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Create a fetcher that identifies itself with `user_agent`.
    pub fn with_user_agent(user_agent: &str) -> FetchResult<Self> {
        Self::from_builder(Self::client_builder(
            user_agent,
            Policy::limited(MAX_REDIRECTS),
        ))
    }

    /// Like [`HttpFetcher::with_user_agent`], but every redirect hop is
    /// checked against `validator` before it is requested.
    pub fn with_redirect_guard(user_agent: &str, validator: UrlValidator) -> FetchResult<Self> {
        Self::from_builder(Self::client_builder(
            user_agent,
            Self::guarded_redirects(validator),
        ))
    }

    fn guarded_redirects(validator: UrlValidator) -> Policy {
        Policy::custom(move |attempt| {
            if attempt.previous().len() > MAX_REDIRECTS {
                return attempt.error("too many redirects");
            }
            let verdict = validator.validate_redirect(attempt.url());
            match verdict {
                Ok(()) => attempt.follow(),
                Err(e) => {
                    warn!(target_url = %attempt.url(), error = %e, "Refusing redirect");
                    attempt.error(e)
                }
            }
        })
    }

    fn client_builder(user_agent: &str, redirect: Policy) -> reqwest::ClientBuilder {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .redirect(redirect)
    }

    fn from_builder(builder: reqwest::ClientBuilder) -> FetchResult<Self> {
        let client = builder.build().map_err(FetchError::http)?;
        Ok(Self {
            client,
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
        })
    }

    /// Set a custom HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Cap the number of body bytes read from a page.
    pub fn with_max_page_bytes(mut self, max: usize) -> Self {
        self.max_page_bytes = max;
        self
    }

    /// The validation error behind a refused redirect, if any.
    fn blocked_redirect(err: &reqwest::Error) -> Option<SecurityError> {
        let mut source = err.source();
        while let Some(cause) = source {
            if let Some(security) = cause.downcast_ref::<SecurityError>() {
                return Some(SecurityError::BlockedRedirect(security.to_string()));
            }
            source = cause.source();
        }
        None
    }

    fn classify(url: &str, err: reqwest::Error) -> FetchError {
        if let Some(security) = Self::blocked_redirect(&err) {
            FetchError::Security(security)
        } else if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() {
            FetchError::Unreachable {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else {
            FetchError::http(err)
        }
    }

    fn head_of(response: &reqwest::Response) -> FetchedResponse {
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let status = response.status();
        FetchedResponse {
            url: response.url().to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            content_type: header(CONTENT_TYPE),
            content_length: header(CONTENT_LENGTH),
            body: String::new(),
        }
    }

    /// Read at most `max_page_bytes`; the remainder is left unread.
    async fn read_capped(&self, url: &str, mut response: reqwest::Response) -> FetchResult<String> {
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| Self::classify(url, e))? {
            let room = self.max_page_bytes.saturating_sub(buf.len());
            if chunk.len() >= room {
                buf.extend_from_slice(&chunk[..room]);
                debug!(url = %url, limit = self.max_page_bytes, "Page body truncated");
                break;
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> FetchResult<FetchedResponse> {
        debug!(url = %url, "HTTP GET starting");
        let request = self.client.get(url).timeout(timeout);

        // The per-request timeout covers body reads too
        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTP request failed");
            Self::classify(url, e)
        })?;

        let mut fetched = Self::head_of(&response);
        if fetched.is_success()
            && fetched
                .content_type
                .as_deref()
                .is_some_and(is_html_content_type)
        {
            fetched.body = self.read_capped(url, response).await?;
        }

        debug!(
            url = %url,
            final_url = %fetched.url,
            status = fetched.status,
            body_len = fetched.body.len(),
            "HTTP GET finished"
        );
        Ok(fetched)
    }

    async fn head(&self, url: &str, timeout: Duration) -> FetchResult<FetchedResponse> {
        let response = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::classify(url, e))?;

        Ok(Self::head_of(&response))
    }

    fn name(&self) -> &str {
        "http"
    }
}

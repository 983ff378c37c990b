//! Fetcher trait and URL validation for SSRF protection.
//!
//! The extractor only ever talks to the network through [`PageFetcher`], so
//! tests can swap in [`crate::fetchers::MockFetcher`] and count calls.
//!
//! # Usage
//!
//! ```rust,ignore
//! use metadata_extractor::{HttpFetcher, ValidatedFetcher};
//!
//! // Always wrap URL-based fetchers in production
//! let fetcher = ValidatedFetcher::new(HttpFetcher::new()?);
//! let response = fetcher.get("https://example.com", Duration::from_secs(10)).await?;
//! ```

use async_trait::async_trait;
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::error::{FetchError, FetchResult, SecurityError, SecurityResult};

/// What came back from a GET or HEAD request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Canonical reason phrase for `status` (may be empty)
    pub status_text: String,

    /// Raw `Content-Type` header
    pub content_type: Option<String>,

    /// Raw `Content-Length` header, unparsed so callers can reject garbage
    pub content_length: Option<String>,

    /// Response body; empty for HEAD and for responses that were not read
    pub body: String,
}

impl FetchedResponse {
    /// Create a response with the given final URL and status.
    pub fn new(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status,
            status_text: reason_phrase(status).to_string(),
            content_type: None,
            content_length: None,
            body: String::new(),
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the raw content length header.
    pub fn with_content_length(mut self, content_length: impl Into<String>) -> Self {
        self.content_length = Some(content_length.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the content type names an HTML document.
    pub fn is_html(&self) -> bool {
        self.content_type.as_deref().is_some_and(is_html_content_type)
    }
}

/// `text/html` or `application/xhtml+xml`, ignoring parameters and case.
pub fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("text/html") || lower.contains("application/xhtml+xml")
}

fn reason_phrase(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

/// Outbound HTTP used by the extractor.
///
/// Implementations must abandon the request (not merely stop waiting) once
/// `timeout` elapses, and report that as [`FetchError::Timeout`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET a page, following redirects.
    ///
    /// The body is only populated for 2xx HTML responses.
    async fn get(&self, url: &str, timeout: Duration) -> FetchResult<FetchedResponse>;

    /// HEAD a resource, following redirects. The body is always empty.
    async fn head(&self, url: &str, timeout: Duration) -> FetchResult<FetchedResponse>;

    /// Get the fetcher name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

/// URL validator for SSRF protection.
///
/// Validates URLs before fetching to prevent:
/// - Access to internal services (localhost, 127.0.0.1)
/// - Access to private IP ranges (10.x, 172.16.x, 192.168.x)
/// - Access to cloud metadata services (169.254.x)
/// - Non-HTTP(S) schemes (file://, ftp://)
#[derive(Debug, Clone)]
pub struct UrlValidator {
    /// Allowed URL schemes
    allowed_schemes: HashSet<String>,

    /// Blocked hostnames
    blocked_hosts: HashSet<String>,

    /// Blocked CIDR ranges
    blocked_cidrs: Vec<ipnet::IpNet>,

    /// Additional allowed hosts (bypass normal validation)
    allowed_hosts: HashSet<String>,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlValidator {
    /// Create a new URL validator with default security rules.
    pub fn new() -> Self {
        let blocked_cidrs = [
            "10.0.0.0/8",
            "172.16.0.0/12",
            "192.168.0.0/16",
            "169.254.0.0/16", // Link-local / cloud metadata
            "127.0.0.0/8",
            "0.0.0.0/8",
            "100.64.0.0/10", // Carrier-grade NAT
            "::1/128",
            "fc00::/7",  // IPv6 private
            "fe80::/10", // IPv6 link-local
        ]
        .into_iter()
        .filter_map(|cidr| cidr.parse().ok())
        .collect();

        Self {
            allowed_schemes: ["http", "https"].into_iter().map(String::from).collect(),
            blocked_hosts: [
                "localhost",
                "127.0.0.1",
                "::1",
                "[::1]",
                "0.0.0.0",
                "metadata.google.internal",
                "metadata.gke.internal",
                "instance-data",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            blocked_cidrs,
            allowed_hosts: HashSet::new(),
        }
    }

    /// Add an allowed host (bypasses validation).
    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.insert(host.into());
        self
    }

    fn check_ip(&self, ip: IpAddr) -> SecurityResult<()> {
        match self.blocked_cidrs.iter().find(|cidr| cidr.contains(&ip)) {
            Some(_) => Err(SecurityError::BlockedCidr(ip.to_string())),
            None => Ok(()),
        }
    }

    /// Validate a URL for safety without touching DNS.
    pub fn validate(&self, url: &str) -> SecurityResult<()> {
        let parsed = url::Url::parse(url)?;

        if !self.allowed_schemes.contains(parsed.scheme()) {
            return Err(SecurityError::DisallowedScheme(parsed.scheme().to_string()));
        }

        let host = parsed.host_str().ok_or(SecurityError::NoHost)?;

        if self.allowed_hosts.contains(host) {
            return Ok(());
        }

        if self.blocked_hosts.contains(host) {
            return Err(SecurityError::BlockedHost(host.to_string()));
        }

        // IPv6 hosts come back bracketed from host_str
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            self.check_ip(ip)?;
        }

        Ok(())
    }

    /// Host and port to resolve for `url`, or `None` when the host is an IP
    /// literal or explicitly allowed.
    fn dns_target(&self, parsed: &url::Url) -> SecurityResult<Option<(String, u16)>> {
        let host = parsed.host_str().ok_or(SecurityError::NoHost)?;
        if self.allowed_hosts.contains(host) {
            return Ok(None);
        }

        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if bare.parse::<IpAddr>().is_ok() {
            return Ok(None);
        }

        let port = parsed.port_or_known_default().unwrap_or(80);
        Ok(Some((bare.to_string(), port)))
    }

    fn check_resolved(
        &self,
        host: &str,
        addrs: impl IntoIterator<Item = SocketAddr>,
    ) -> SecurityResult<()> {
        for addr in addrs {
            self.check_ip(addr.ip()).map_err(|_| {
                SecurityError::BlockedCidr(format!(
                    "DNS for {} resolved to blocked IP {}",
                    host,
                    addr.ip()
                ))
            })?;
        }
        Ok(())
    }

    /// Validate a URL and resolve DNS to check the actual IP.
    ///
    /// This catches DNS rebinding attacks where a hostname resolves
    /// to an internal IP.
    pub async fn validate_with_dns(&self, url: &str) -> SecurityResult<()> {
        self.validate(url)?;

        let parsed = url::Url::parse(url)?;
        let Some((host, port)) = self.dns_target(&parsed)? else {
            return Ok(());
        };

        let addrs = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|e| SecurityError::DnsResolution(e.to_string()))?;
        self.check_resolved(&host, addrs)
    }

    /// Validate a redirect hop, resolving its host on the calling thread.
    ///
    /// reqwest runs redirect policies synchronously, so the async resolver
    /// is not available here.
    pub fn validate_redirect(&self, url: &url::Url) -> SecurityResult<()> {
        self.validate(url.as_str())?;

        let Some((host, port)) = self.dns_target(url)? else {
            return Ok(());
        };

        let addrs = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| SecurityError::DnsResolution(e.to_string()))?;
        self.check_resolved(&host, addrs)
    }
}

/// A fetcher that validates URLs before fetching (SSRF protection).
///
/// Only the requested URL and the final URL are visible here. Intermediate
/// redirect hops are the inner fetcher's job: pair this with
/// [`crate::HttpFetcher::with_redirect_guard`] so a blocked hop is never
/// requested at all. A response whose final URL is blocked is discarded.
pub struct ValidatedFetcher<F: PageFetcher> {
    inner: F,
    validator: UrlValidator,
}

impl<F: PageFetcher> ValidatedFetcher<F> {
    /// Create a new validated fetcher with default security rules.
    pub fn new(fetcher: F) -> Self {
        Self {
            inner: fetcher,
            validator: UrlValidator::new(),
        }
    }

    /// Create with a custom validator.
    pub fn with_validator(fetcher: F, validator: UrlValidator) -> Self {
        Self {
            inner: fetcher,
            validator,
        }
    }

    async fn check(&self, url: &str) -> FetchResult<()> {
        self.validator
            .validate_with_dns(url)
            .await
            .map_err(FetchError::Security)
    }

    fn check_final(&self, response: FetchedResponse) -> FetchResult<FetchedResponse> {
        self.validator
            .validate(&response.url)
            .map_err(FetchError::Security)?;
        Ok(response)
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for ValidatedFetcher<F> {
    async fn get(&self, url: &str, timeout: Duration) -> FetchResult<FetchedResponse> {
        self.check(url).await?;
        let response = self.inner.get(url, timeout).await?;
        self.check_final(response)
    }

    async fn head(&self, url: &str, timeout: Duration) -> FetchResult<FetchedResponse> {
        self.check(url).await?;
        let response = self.inner.head(url, timeout).await?;
        self.check_final(response)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

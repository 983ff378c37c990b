//! Typed errors for the metadata extractor.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can branch
//! on the failure without string matching.

use thiserror::Error;

/// Errors raised while normalizing a user-supplied URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    /// Input could not be parsed into an absolute URL with a host
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

/// Errors that can occur while talking to a remote site.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Security validation failed
    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    /// The request did not complete before its deadline
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// DNS lookup or TCP/TLS connect failed
    #[error("could not reach {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// Any other transport failure
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl FetchError {
    /// Wrap an arbitrary transport error.
    pub fn http(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Http(err.into())
    }
}

/// Security-related errors, primarily for SSRF protection.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// Host is blocked (e.g., localhost, internal IPs)
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// IP in blocked CIDR range (e.g., 10.0.0.0/8)
    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    /// URL has no host
    #[error("URL has no host")]
    NoHost,

    /// A redirect hop failed validation and was not followed
    #[error("redirect blocked: {0}")]
    BlockedRedirect(String),

    /// DNS resolution failed
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias for URL normalization.
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for security operations.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;

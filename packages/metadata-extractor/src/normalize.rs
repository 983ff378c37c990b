//! URL validation and normalization for user-submitted links.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use crate::error::{UrlError, UrlResult};

/// Query parameters that only carry attribution and never change the page.
pub const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "source",
];

lazy_static! {
    static ref SCHEME_PREFIX: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*://").unwrap();
}

/// Check that `url` is a well-formed absolute URL with a scheme and a host.
///
/// Purely syntactic: says nothing about reachability.
pub fn validate_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

/// [`validate_url`] restricted to `http` and `https`, the only schemes the
/// extractor will fetch.
pub fn validate_web_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| {
            matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty())
        })
        .unwrap_or(false)
}

/// Normalize a user-supplied link into a canonical absolute URL.
///
/// Trims whitespace, assumes `https://` when no scheme is given and drops
/// [`TRACKING_PARAMS`] while keeping the order of the remaining parameters.
pub fn sanitize_url(url: &str) -> UrlResult<String> {
    let trimmed = url.trim();
    let invalid = || UrlError::InvalidUrl {
        url: url.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid());
    }

    let candidate = if SCHEME_PREFIX.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut parsed = Url::parse(&candidate).map_err(|_| invalid())?;
    if !parsed.host_str().is_some_and(|h| !h.is_empty()) {
        return Err(invalid());
    }

    strip_tracking_params(&mut parsed);

    Ok(parsed.to_string())
}

/// Remove tracking parameters in place, dropping the query entirely when
/// nothing is left.
fn strip_tracking_params(url: &mut Url) {
    if url.query().is_none() {
        return;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}

/// `scheme://host[:port]` of a parsed URL.
pub(crate) fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

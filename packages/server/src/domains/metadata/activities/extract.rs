//! Metadata extraction activity.
//!
//! Order matters: the rate limit is checked before the body is even parsed,
//! and a cache hit never reaches the extractor.

use metadata_extractor::extractor::INVALID_URL_MESSAGE;
use metadata_extractor::{validate_url, validate_web_url, ExtractionResult, FailureKind};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::domains::metadata::models::{ExtractRequest, FieldError, GatewayOutcome};
use crate::kernel::{CachedExtraction, ServerDeps};

const INVALID_REQUEST_MESSAGE: &str = "Invalid request data";
const UNSUPPORTED_SCHEME_MESSAGE: &str = "URL must use http or https";

/// Validate the raw request body.
pub fn parse_extract_request(body: &[u8]) -> Result<ExtractRequest, GatewayOutcome> {
    let invalid = |field: &str, message: &str| GatewayOutcome::InvalidRequest {
        error: INVALID_REQUEST_MESSAGE.to_string(),
        details: vec![FieldError::new(field, message)],
    };

    let value: Value = serde_json::from_slice(body)
        .map_err(|_| invalid("body", "Request body must be valid JSON"))?;
    let Some(object) = value.as_object() else {
        return Err(invalid("body", "Request body must be a JSON object"));
    };

    let url = match object.get("url") {
        None | Some(Value::Null) => return Err(invalid("url", "URL is required")),
        Some(Value::String(url)) => url,
        Some(_) => return Err(invalid("url", "URL must be a string")),
    };

    if !validate_url(url) {
        return Err(invalid("url", INVALID_URL_MESSAGE));
    }
    if !validate_web_url(url) {
        return Err(invalid("url", UNSUPPORTED_SCHEME_MESSAGE));
    }

    Ok(ExtractRequest { url: url.clone() })
}

/// Handle one extraction request for `caller_id`.
pub async fn extract_metadata(deps: &ServerDeps, caller_id: &str, body: &[u8]) -> GatewayOutcome {
    let decision = deps.rate_limiter.check_rate_limit(caller_id).await;
    if !decision.allowed {
        let retry_after_secs = decision.retry_after_secs(deps.clock.now());
        info!(caller = %caller_id, retry_after_secs, "Metadata request rate limited");
        return GatewayOutcome::RateLimited {
            decision,
            retry_after_secs,
        };
    }

    let request = match parse_extract_request(body) {
        Ok(request) => request,
        Err(outcome) => return outcome,
    };
    let url = request.url;

    match deps.cache.get(&url).await {
        Ok(Some(extraction)) => {
            debug!(url = %url, cached = true, "Metadata served from cache");
            return GatewayOutcome::Completed {
                extraction,
                cached: true,
            };
        }
        Ok(None) => {}
        Err(e) => warn!(url = %url, error = %e, "Cache lookup failed, extracting"),
    }

    let started = Instant::now();
    let result = match tokio::time::timeout(
        deps.gateway.request_timeout,
        deps.extractor.extract(&url),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            warn!(
                url = %url,
                timeout_secs = deps.gateway.request_timeout.as_secs(),
                "Metadata extraction exceeded request deadline"
            );
            return GatewayOutcome::DeadlineExceeded { url };
        }
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let (extraction, ttl) = match result {
        ExtractionResult::Success { metadata } => {
            info!(url = %url, elapsed_ms, "Metadata extracted");
            (
                CachedExtraction::Extracted {
                    metadata,
                    extracted_at: deps.clock.now(),
                },
                deps.gateway.success_ttl,
            )
        }
        ExtractionResult::Failure(failure) => {
            info!(
                url = %url,
                kind = ?failure.kind,
                error = %failure.error,
                elapsed_ms,
                "Metadata extraction failed"
            );
            (
                CachedExtraction::Failed {
                    error: failure.error,
                    kind: failure.kind,
                    fallback_data: failure.fallback_data,
                    url: url.clone(),
                },
                deps.gateway.failure_ttl,
            )
        }
    };

    // Rejected input is a property of the request, not of the remote site
    let cacheable = !matches!(
        &extraction,
        CachedExtraction::Failed {
            kind: FailureKind::InvalidUrl,
            ..
        }
    );
    if cacheable {
        if let Err(e) = deps.cache.put(&url, extraction.clone(), ttl).await {
            warn!(url = %url, error = %e, "Failed to cache extraction result");
        }
    }

    GatewayOutcome::Completed {
        extraction,
        cached: false,
    }
}

use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use metadata_extractor::fetchers::{DEFAULT_MAX_PAGE_BYTES, DEFAULT_USER_AGENT};
use metadata_extractor::ExtractorConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domains::metadata::GatewayConfig;
use crate::kernel::rate_limit::DEFAULT_SWEEP_THRESHOLD;
use crate::server::AppOptions;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    pub cache_success_ttl_secs: u64,
    pub cache_failure_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub page_fetch_timeout_secs: u64,
    pub image_fetch_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_page_bytes: usize,
    pub crawler_user_agent: String,
    pub block_private_networks: bool,
    /// Take the caller address from X-Forwarded-For / X-Real-IP. Only safe
    /// behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            rate_limit_max_requests: 30,
            rate_limit_window_secs: 60,
            cache_success_ttl_secs: 24 * 60 * 60,
            cache_failure_ttl_secs: 5 * 60,
            cache_max_entries: 10_000,
            page_fetch_timeout_secs: 10,
            image_fetch_timeout_secs: 5,
            request_timeout_secs: 20,
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
            crawler_user_agent: DEFAULT_USER_AGENT.to_string(),
            block_private_networks: true,
            trust_proxy_headers: false,
            allowed_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            port: parse_or(&lookup, "PORT", defaults.port)?,
            rate_limit_max_requests: parse_or(
                &lookup,
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            )?,
            rate_limit_window_secs: parse_or(
                &lookup,
                "RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window_secs,
            )?,
            cache_success_ttl_secs: parse_or(
                &lookup,
                "CACHE_SUCCESS_TTL_SECS",
                defaults.cache_success_ttl_secs,
            )?,
            cache_failure_ttl_secs: parse_or(
                &lookup,
                "CACHE_FAILURE_TTL_SECS",
                defaults.cache_failure_ttl_secs,
            )?,
            cache_max_entries: parse_or(&lookup, "CACHE_MAX_ENTRIES", defaults.cache_max_entries)?,
            page_fetch_timeout_secs: parse_or(
                &lookup,
                "PAGE_FETCH_TIMEOUT_SECS",
                defaults.page_fetch_timeout_secs,
            )?,
            image_fetch_timeout_secs: parse_or(
                &lookup,
                "IMAGE_FETCH_TIMEOUT_SECS",
                defaults.image_fetch_timeout_secs,
            )?,
            request_timeout_secs: parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            max_page_bytes: parse_or(&lookup, "MAX_PAGE_BYTES", defaults.max_page_bytes)?,
            crawler_user_agent: lookup("CRAWLER_USER_AGENT")
                .filter(|ua| !ua.trim().is_empty())
                .unwrap_or(defaults.crawler_user_agent),
            block_private_networks: match lookup("BLOCK_PRIVATE_NETWORKS") {
                Some(raw) => parse_bool(&raw)
                    .context("BLOCK_PRIVATE_NETWORKS must be true or false")?,
                None => defaults.block_private_networks,
            },
            trust_proxy_headers: match lookup("TRUST_PROXY_HEADERS") {
                Some(raw) => {
                    parse_bool(&raw).context("TRUST_PROXY_HEADERS must be true or false")?
                }
                None => defaults.trust_proxy_headers,
            },
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };

        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        let positive = [
            ("RATE_LIMIT_MAX_REQUESTS", self.rate_limit_max_requests as u64),
            ("RATE_LIMIT_WINDOW_SECS", self.rate_limit_window_secs),
            ("CACHE_MAX_ENTRIES", self.cache_max_entries as u64),
            ("PAGE_FETCH_TIMEOUT_SECS", self.page_fetch_timeout_secs),
            ("IMAGE_FETCH_TIMEOUT_SECS", self.image_fetch_timeout_secs),
            ("REQUEST_TIMEOUT_SECS", self.request_timeout_secs),
            ("MAX_PAGE_BYTES", self.max_page_bytes as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                bail!("{} must be greater than zero", name);
            }
        }
        Ok(())
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            rate_limit_max_requests: self.rate_limit_max_requests,
            rate_limit_window: Duration::from_secs(self.rate_limit_window_secs),
            rate_limit_sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
            success_ttl: Duration::from_secs(self.cache_success_ttl_secs),
            failure_ttl: Duration::from_secs(self.cache_failure_ttl_secs),
            cache_max_entries: self.cache_max_entries,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn app_options(&self) -> AppOptions {
        AppOptions {
            allowed_origins: self.allowed_origins.clone(),
            trust_proxy_headers: self.trust_proxy_headers,
        }
    }

    pub fn extractor(&self) -> ExtractorConfig {
        ExtractorConfig {
            page_timeout: Duration::from_secs(self.page_fetch_timeout_secs),
            image_timeout: Duration::from_secs(self.image_fetch_timeout_secs),
            ..Default::default()
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number, got {:?}", key, raw)),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("invalid boolean {:?}", other),
    }
}

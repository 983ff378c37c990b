//! Extraction result cache.
//!
//! Entries are keyed by the request URL exactly as the caller sent it and
//! expire lazily: an expired entry is removed the next time it is looked up,
//! or when the store is full and needs room.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metadata_extractor::{ExtractedMetadata, FailureKind, PartialMetadata};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::clock::Clock;

/// Cache store errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache lock poisoned")]
    LockPoisoned,

    #[error("TTL out of range: {0:?}")]
    InvalidTtl(Duration),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// What gets cached for one URL: either the extracted metadata or the
/// failure that was reported for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CachedExtraction {
    #[serde(rename_all = "camelCase")]
    Extracted {
        metadata: ExtractedMetadata,
        extracted_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        error: String,
        kind: FailureKind,
        fallback_data: Option<PartialMetadata>,
        url: String,
    },
}

impl CachedExtraction {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Key-value store for extraction outcomes with per-entry TTL.
#[async_trait]
pub trait MetadataCache: Send + Sync {
    /// Look up an unexpired entry.
    async fn get(&self, key: &str) -> CacheResult<Option<CachedExtraction>>;

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    async fn put(&self, key: &str, value: CachedExtraction, ttl: Duration) -> CacheResult<()>;

    /// Number of entries currently held (expired ones included until evicted).
    async fn len(&self) -> CacheResult<usize>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: CachedExtraction,
    stored_at: DateTime<Utc>,
    ttl: chrono::Duration,
}

impl CacheEntry {
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.stored_at + self.ttl
    }
}

/// Process-local cache bounded to `max_entries`.
pub struct MemoryMetadataCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl MemoryMetadataCache {
    pub fn new(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    /// Make room for one more entry: drop everything expired, then the
    /// oldest entries until under the bound.
    fn make_room(entries: &mut HashMap<String, CacheEntry>, max: usize, now: DateTime<Utc>) {
        if entries.len() < max {
            return;
        }

        let before = entries.len();
        entries.retain(|_, entry| entry.is_valid_at(now));
        if entries.len() < before {
            debug!(purged = before - entries.len(), "Purged expired cache entries");
        }

        while entries.len() >= max {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    debug!(url = %key, "Evicting oldest cache entry");
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl MetadataCache for MemoryMetadataCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CachedExtraction>> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().map_err(|_| CacheError::LockPoisoned)?;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_valid_at(now) => return Ok(Some(entry.data.clone())),
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock, a fresh put may have landed
        let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
        if entries.get(key).is_some_and(|entry| !entry.is_valid_at(now)) {
            entries.remove(key);
            debug!(url = %key, "Evicted expired cache entry");
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: CachedExtraction, ttl: Duration) -> CacheResult<()> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| CacheError::InvalidTtl(ttl))?;
        let now = self.clock.now();

        let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
        if !entries.contains_key(key) {
            Self::make_room(&mut entries, self.max_entries, now);
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                data: value,
                stored_at: now,
                ttl,
            },
        );
        Ok(())
    }

    async fn len(&self) -> CacheResult<usize> {
        Ok(self
            .entries
            .read()
            .map_err(|_| CacheError::LockPoisoned)?
            .len())
    }
}

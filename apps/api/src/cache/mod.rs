//! Analysis cache: timestamped entries behind a pluggable backend.
//!
//! An entry is served only if it is younger than the TTL and its settings snapshot
//! matches both the current snapshot schema and the current settings. Anything
//! else is a miss and the stale entry is deleted on the spot; there is no sweeper.
//! Entries are always replaced whole.

pub mod backend;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::models::{snapshot_is_compatible, AnalysisResult};

pub use backend::{CacheBackend, MemoryCacheBackend, RedisCacheBackend};

pub const DEFAULT_CACHE_PREFIX: &str = "analysis_cache";
pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(error: redis::RedisError) -> Self {
        CacheError::Backend(error.to_string())
    }
}

/// A stored analysis with the settings that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: DateTime<Utc>,
    pub result: AnalysisResult,
    /// Kept as raw JSON so entries written by older code still deserialize and
    /// can be recognised as incompatible.
    pub settings_snapshot: Value,
}

impl CacheEntry {
    pub fn new(result: AnalysisResult, settings_snapshot: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            result,
            settings_snapshot,
        }
    }
}

/// Why a stored entry was not served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    Unreadable,
    Expired,
    IncompatibleSnapshot,
    SettingsChanged,
}

impl Invalidation {
    fn as_str(&self) -> &'static str {
        match self {
            Invalidation::Unreadable => "unreadable",
            Invalidation::Expired => "expired",
            Invalidation::IncompatibleSnapshot => "incompatible settings snapshot",
            Invalidation::SettingsChanged => "settings changed",
        }
    }
}

/// TTL- and settings-aware cache over a `CacheBackend`.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            ttl,
        }
    }

    /// `<prefix>_<digest>`, or `<prefix>_fallback_<digest>` for fallback digests.
    pub fn namespaced_key(&self, digest: &str, fallback_digest: bool) -> String {
        if fallback_digest {
            format!("{}_fallback_{}", self.prefix, digest)
        } else {
            format!("{}_{}", self.prefix, digest)
        }
    }

    /// Returns a servable entry, or `None` after evicting one that is not.
    pub async fn get(
        &self,
        key: &str,
        current_snapshot: &Value,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let Some(raw) = self.backend.get(key).await? else {
            debug!("Cache miss for {key}");
            return Ok(None);
        };

        let entry = serde_json::from_str::<CacheEntry>(&raw).ok();
        match entry {
            Some(entry) => match self.check(&entry, current_snapshot, Utc::now()) {
                None => Ok(Some(entry)),
                Some(reason) => {
                    self.evict(key, reason).await;
                    Ok(None)
                }
            },
            None => {
                self.evict(key, Invalidation::Unreadable).await;
                Ok(None)
            }
        }
    }

    pub async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let serialized = serde_json::to_string(entry)?;
        self.backend.set(key, serialized).await?;
        debug!("Cached analysis under {key}");
        Ok(())
    }

    /// Deletes an entry. Failures are logged, never returned.
    pub async fn remove(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            warn!("Failed to delete cache entry {key}: {e}");
        }
    }

    fn check(
        &self,
        entry: &CacheEntry,
        current_snapshot: &Value,
        now: DateTime<Utc>,
    ) -> Option<Invalidation> {
        if now - entry.timestamp > self.ttl {
            Some(Invalidation::Expired)
        } else if !snapshot_is_compatible(&entry.settings_snapshot) {
            Some(Invalidation::IncompatibleSnapshot)
        } else if entry.settings_snapshot != *current_snapshot {
            Some(Invalidation::SettingsChanged)
        } else {
            None
        }
    }

    async fn evict(&self, key: &str, reason: Invalidation) {
        info!("Evicting cache entry {key}: {}", reason.as_str());
        self.remove(key).await;
    }
}

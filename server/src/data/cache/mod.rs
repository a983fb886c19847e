//! Process-local caching
//!
//! Two named `TtlCache` instances back the hot read paths: `profiles`
//! (read on every stream) and `models` (read-mostly, refreshed by an
//! explicit sync). Entries expire after a per-instance TTL; writers
//! invalidate by exact key or by prefix. The rate limiter shares this
//! module because it is the other piece of process-global mutable state.

mod key;
pub mod rate_limiter;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use key::CacheKey;
pub use rate_limiter::{RateLimitResult, RateLimiter};

use crate::core::constants::CACHE_MAX_ENTRIES;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub name: &'static str,
    pub hits: u64,
    pub misses: u64,
    pub size: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}

/// Fixed-TTL key/value store
///
/// Values are stored as MessagePack bytes; `get`/`set` serialize through
/// serde. A lookup after the TTL has elapsed behaves as absent. Safe under
/// concurrent access; hit/miss counters are atomic.
pub struct TtlCache {
    name: &'static str,
    ttl: Duration,
    cache: Cache<String, Vec<u8>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TtlCache {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_MAX_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self {
            name,
            ttl,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a typed value. Counts a hit or a miss; an entry that fails to
    /// deserialize (stale layout) is dropped and counted as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Some(bytes) => match rmp_serde::from_slice(&bytes) {
                Ok(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!(cache = self.name, %key, error = %e, "Dropping undecodable cache entry");
                    self.cache.invalidate(key).await;
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    None
                }
            },
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Set a typed value under the instance TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let bytes =
            rmp_serde::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.cache.insert(key.to_string(), bytes).await;
        Ok(())
    }

    /// Set with error logging instead of propagation. Cache writes are
    /// best-effort on every call site.
    pub async fn set_logged<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.set(key, value).await {
            tracing::warn!(cache = self.name, %key, error = %e, "Cache set failed");
        }
    }

    /// Remove one key
    pub async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Remove every key starting with `prefix`, returning the count removed
    pub async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| (*k).clone())
            .collect();

        let mut count = 0u64;
        for key in keys {
            self.cache.invalidate(&key).await;
            count += 1;
        }
        count
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Snapshot current statistics
    pub async fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks().await;
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            name: self.name,
            hits,
            misses,
            size: self.cache.entry_count(),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

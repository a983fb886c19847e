//! IP-keyed rate limiter
//!
//! Fixed window counters over a concurrent map. Each window starts when the
//! first request arrives and resets after the window duration expires.
//!
//! # Known Limitations
//!
//! Fixed windows allow up to 2x the limit at window boundaries (a full
//! window's worth in the last second of one window plus another in the first
//! second of the next). Acceptable for a single-user local gateway.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use super::key::CacheKey;
use crate::core::config::RateLimitPolicy;

/// Counter sweep cadence (operations between expired-counter cleanups)
const CLEANUP_EVERY_OPS: u64 = 256;

struct CounterEntry {
    count: AtomicI64,
    expires_at: Instant,
}

/// Rate limit check result
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Requests remaining in the window
    pub remaining: u32,
    /// Configured limit
    pub limit: u32,
    /// Unix timestamp when the window resets
    pub reset_at: u64,
    /// Seconds until retry (only when blocked)
    pub retry_after: Option<u64>,
}

/// Process-global fixed-window rate limiter
pub struct RateLimiter {
    counters: DashMap<String, CounterEntry>,
    /// Tracks operations to schedule periodic counter cleanup
    cleanup_ops: AtomicU64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
            cleanup_ops: AtomicU64::new(0),
        }
    }

    /// Count one request against `policy` for `identifier` under `endpoint`
    pub fn check(
        &self,
        policy: &RateLimitPolicy,
        endpoint: &str,
        identifier: &str,
    ) -> RateLimitResult {
        let key = CacheKey::rate_limit(endpoint, identifier);
        let window = Duration::from_secs(policy.window_secs);
        let now = Instant::now();

        let now_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "System clock is before UNIX epoch");
                0
            });

        let (count, remaining_window) = {
            use dashmap::mapref::entry::Entry;

            match self.counters.entry(key) {
                Entry::Occupied(mut occupied) => {
                    let counter = occupied.get_mut();
                    if now >= counter.expires_at {
                        counter.count.store(1, Ordering::SeqCst);
                        counter.expires_at = now + window;
                        (1, window)
                    } else {
                        let count = counter.count.fetch_add(1, Ordering::SeqCst) + 1;
                        (count, counter.expires_at.saturating_duration_since(now))
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(CounterEntry {
                        count: AtomicI64::new(1),
                        expires_at: now + window,
                    });
                    (1, window)
                }
            }
        };

        let ops = self.cleanup_ops.fetch_add(1, Ordering::Relaxed);
        if ops.is_multiple_of(CLEANUP_EVERY_OPS) {
            self.cleanup_expired_counters();
        }

        let limit_i64 = i64::from(policy.limit);
        let allowed = count <= limit_i64;
        let remaining = limit_i64.saturating_sub(count).try_into().unwrap_or(0u32);
        let reset_at = now_unix.saturating_add(remaining_window.as_secs());

        tracing::trace!(
            endpoint,
            %identifier,
            count,
            limit = policy.limit,
            allowed,
            "Rate limit check"
        );

        RateLimitResult {
            allowed,
            remaining,
            limit: policy.limit,
            reset_at,
            retry_after: if allowed {
                None
            } else {
                Some(remaining_window.as_secs().max(1))
            },
        }
    }

    fn cleanup_expired_counters(&self) {
        let now = Instant::now();
        self.counters.retain(|_, entry| now < entry.expires_at);
    }

    /// Drop all counters. Tests reset the process-global limiter between
    /// cases with this.
    pub fn reset(&self) {
        self.counters.clear();
    }
}

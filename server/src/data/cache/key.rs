//! Type-safe cache key builder with versioning

use crate::core::constants::CACHE_KEY_VERSION;

/// Type-safe cache key builder
///
/// All keys carry a version prefix (e.g. "v1:") so a layout change can
/// invalidate all cached data at once.
pub struct CacheKey;

impl CacheKey {
    /// Cache key for a single profile
    pub fn profile(id: i64) -> String {
        format!("{}:profile:{}", CACHE_KEY_VERSION, id)
    }

    /// Prefix covering every single-profile key
    pub fn profile_prefix() -> String {
        format!("{}:profile:", CACHE_KEY_VERSION)
    }

    /// Cache key for the full profile list
    pub fn profiles_all() -> String {
        format!("{}:profiles:all", CACHE_KEY_VERSION)
    }

    /// Cache key for the unfiltered model list
    pub fn models_all() -> String {
        format!("{}:models:all", CACHE_KEY_VERSION)
    }

    /// Rate limiter counter key for an endpoint/client pair
    pub fn rate_limit(endpoint: &str, identifier: &str) -> String {
        format!("{}:rl:{}:{}", CACHE_KEY_VERSION, endpoint, identifier)
    }
}

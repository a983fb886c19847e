//! Data layer: embedded store, caches, and document storage

pub mod cache;
pub mod documents;
pub mod sqlite;
pub mod types;

pub use cache::{CacheKey, CacheStats, RateLimiter, TtlCache};
pub use documents::{DocumentError, DocumentMeta, DocumentStore};
pub use sqlite::{SqliteService, StoreError};

//! Typed repositories
//!
//! The single choke point for persistence. Each entity exposes the minimal
//! operations the gateway needs; there is no generic query surface. Read
//! paths for profiles and models consult the cache first; every write
//! invalidates the keys it can stale.

pub mod message;
pub mod model;
pub mod profile;
pub mod search;
pub mod session;
pub mod usage;

#[cfg(test)]
pub(crate) mod testutil {
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqlitePoolOptions;

    use crate::data::sqlite::migrations;

    /// In-memory pool at the latest schema version. A single connection so
    /// every test statement sees the same database.
    pub async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        pool
    }
}

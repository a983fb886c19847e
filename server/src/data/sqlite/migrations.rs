//! Database migration system
//!
//! Schema is versioned by a ladder of numbered migrations, each with a
//! forward and a backward script. Applied versions are recorded in
//! `schema_migrations`; startup applies pending versions in order and any
//! failure aborts startup. `revert_to` walks backward scripts in reverse,
//! used by operators and by tests exercising the reversibility invariant.

use sha2::{Digest, Sha256};
use sqlx::{Connection, SqlitePool};

use super::error::StoreError;
use super::schema::{V1_DOWN, V1_UP, V2_DOWN, V2_UP, V3_DOWN, V3_UP};

/// One schema version step
pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

/// The full migration ladder, in application order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        up: V1_UP,
        down: V1_DOWN,
    },
    Migration {
        version: 2,
        name: "message_search",
        up: V2_UP,
        down: V2_DOWN,
    },
    Migration {
        version: 3,
        name: "add_profile_preset",
        up: V3_UP,
        down: V3_DOWN,
    },
];

const CREATE_MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
)
"#;

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let current = current_version(pool).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply_migration(pool, migration).await?;
    }

    Ok(())
}

/// Highest applied version, 0 for a fresh database
pub async fn current_version(pool: &SqlitePool) -> Result<i32, StoreError> {
    let version: Option<i32> =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;
    Ok(version.unwrap_or(0))
}

async fn apply_migration(pool: &SqlitePool, migration: &Migration) -> Result<(), StoreError> {
    let start = std::time::Instant::now();

    let mut tx = pool.begin().await?;

    sqlx::raw_sql(migration.up)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::MigrationFailed {
            version: migration.version,
            name: migration.name.to_string(),
            error: e.to_string(),
        })?;

    let now = chrono::Utc::now().timestamp();
    let checksum = sha256_hex(migration.up);
    let elapsed_ms = start.elapsed().as_millis() as i64;
    sqlx::query(
        "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms, success) VALUES (?, ?, ?, ?, ?, 1)",
    )
    .bind(migration.version)
    .bind(migration.name)
    .bind(now)
    .bind(&checksum)
    .bind(elapsed_ms)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        version = migration.version,
        name = migration.name,
        elapsed_ms,
        "Applied migration"
    );
    Ok(())
}

/// Revert applied migrations down to (and keeping) `target` version
///
/// Backward scripts that rewrite tables by copy need foreign-key enforcement
/// off for the duration; enforcement is restored and verified with
/// `foreign_key_check` before commit.
pub async fn revert_to(pool: &SqlitePool, target: i32) -> Result<(), StoreError> {
    let current = current_version(pool).await?;

    for migration in MIGRATIONS
        .iter()
        .rev()
        .filter(|m| m.version <= current && m.version > target)
    {
        revert_migration(pool, migration).await?;
    }

    Ok(())
}

async fn revert_migration(pool: &SqlitePool, migration: &Migration) -> Result<(), StoreError> {
    let mut conn = pool.acquire().await?;

    // foreign_keys cannot change inside a transaction
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(&mut *conn)
        .await?;

    let result: Result<(), StoreError> = async {
        let mut tx = conn.begin().await?;

        sqlx::raw_sql(migration.down)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::MigrationFailed {
                version: migration.version,
                name: migration.name.to_string(),
                error: format!("revert failed: {e}"),
            })?;

        sqlx::query("DELETE FROM schema_migrations WHERE version = ?")
            .bind(migration.version)
            .execute(&mut *tx)
            .await?;

        let violations = sqlx::query("PRAGMA foreign_key_check")
            .fetch_all(&mut *tx)
            .await?;
        if !violations.is_empty() {
            return Err(StoreError::MigrationFailed {
                version: migration.version,
                name: migration.name.to_string(),
                error: format!("revert left {} foreign key violations", violations.len()),
            });
        }

        tx.commit().await?;
        Ok(())
    }
    .await;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    result?;

    tracing::debug!(
        version = migration.version,
        name = migration.name,
        "Reverted migration"
    );
    Ok(())
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap()
    }

    async fn user_tables(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' AND name != 'schema_migrations' \
             ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_database_migrates_to_latest() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();

        let version = current_version(&pool).await.unwrap();
        assert_eq!(version, MIGRATIONS.last().unwrap().version);

        let tables = user_tables(&pool).await;
        for required in ["models", "profiles", "sessions", "messages", "usage_logs"] {
            assert!(tables.iter().any(|t| t == required), "missing {required}");
        }
    }

    #[tokio::test]
    async fn test_running_twice_is_a_noop() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        let before = user_tables(&pool).await;

        run_migrations(&pool).await.unwrap();
        let after = user_tables(&pool).await;

        assert_eq!(before, after);
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_forward_then_backward_restores_empty_database() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();

        revert_to(&pool, 0).await.unwrap();

        assert_eq!(current_version(&pool).await.unwrap(), 0);
        let tables = user_tables(&pool).await;
        assert!(tables.is_empty(), "leftover tables: {tables:?}");
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_revert_preset_preserves_profile_data() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();

        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO profiles (name, system_prompt, temperature, max_tokens, preset, created_at, updated_at) \
             VALUES ('writer', 'Be helpful.', 0.5, 1024, 'coding', ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();

        // Drop back to v2: preset column is rewritten away, rows survive
        revert_to(&pool, 2).await.unwrap();

        let (name, temperature): (String, f64) =
            sqlx::query_as("SELECT name, temperature FROM profiles WHERE name = 'writer'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(name, "writer");
        assert_eq!(temperature, 0.5);

        let columns = sqlx::query("SELECT * FROM pragma_table_info('profiles') WHERE name = 'preset'")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert!(columns.is_empty());

        // And forward again reaches latest
        run_migrations(&pool).await.unwrap();
        assert_eq!(
            current_version(&pool).await.unwrap(),
            MIGRATIONS.last().unwrap().version
        );
    }

    #[tokio::test]
    async fn test_fts_shadow_tracks_messages() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();

        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO sessions (id, session_type, created_at, updated_at) VALUES ('s1', 'chat', ?, ?)")
            .bind(now)
            .bind(now)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO messages (id, session_id, role, content, created_at) VALUES ('m1', 's1', 'user', 'hello world', ?)")
            .bind(now)
            .execute(&pool)
            .await
            .unwrap();

        let hits: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages_fts WHERE messages_fts MATCH 'hello'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(hits, 1);

        sqlx::query("UPDATE messages SET content = 'goodbye world' WHERE id = 'm1'")
            .execute(&pool)
            .await
            .unwrap();
        let hits: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages_fts WHERE messages_fts MATCH 'hello'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(hits, 0);

        sqlx::query("DELETE FROM messages WHERE id = 'm1'")
            .execute(&pool)
            .await
            .unwrap();
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages_fts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }
}

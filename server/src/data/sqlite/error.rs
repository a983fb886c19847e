//! Store error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("Invalid search query: {0}")]
    BadQuery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_failed_display() {
        let err = StoreError::MigrationFailed {
            version: 2,
            name: "message_search".to_string(),
            error: "syntax error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Migration 2 (message_search) failed: syntax error"
        );
    }

    #[test]
    fn test_bad_query_display() {
        let err = StoreError::BadQuery("unbalanced quotes".to_string());
        assert!(err.to_string().contains("unbalanced quotes"));
    }
}

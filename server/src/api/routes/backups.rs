//! Backup snapshot endpoints
//!
//! A backup checkpoints the WAL and copies the database file into the
//! backups directory as a timestamped snapshot.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::api::AppState;
use crate::api::error::ApiError;

#[derive(Debug, Serialize)]
pub struct BackupInfo {
    pub file: String,
    pub size_bytes: u64,
    pub created_at: i64,
}

/// POST /api/backups
pub async fn create_backup(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<BackupInfo>), ApiError> {
    state.db.checkpoint().await?;

    let now = chrono::Utc::now();
    let file = format!("chatrelay-{}.db", now.format("%Y%m%dT%H%M%S"));
    let target = state.storage.backups_dir().join(&file);

    tokio::fs::create_dir_all(state.storage.backups_dir())
        .await
        .map_err(ApiError::file_save_failed)?;
    let size_bytes = tokio::fs::copy(state.storage.db_path(), &target)
        .await
        .map_err(ApiError::file_save_failed)?;

    tracing::info!(file, size_bytes, "Backup snapshot created");
    Ok((
        StatusCode::CREATED,
        Json(BackupInfo {
            file,
            size_bytes,
            created_at: now.timestamp(),
        }),
    ))
}

/// GET /api/backups
pub async fn list_backups(
    State(state): State<AppState>,
) -> Result<Json<Vec<BackupInfo>>, ApiError> {
    let dir = state.storage.backups_dir();
    let mut backups = Vec::new();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        // No snapshots yet
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Json(backups)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list backups");
            return Err(ApiError::stream_error("Failed to list backups"));
        }
    };

    while let Some(entry) = entries.next_entry().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to list backups");
        ApiError::stream_error("Failed to list backups")
    })? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.ends_with(".db") {
            continue;
        }
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        let created_at = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        backups.push(BackupInfo {
            file: name,
            size_bytes: metadata.len(),
            created_at,
        });
    }

    backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.file.cmp(&a.file)));
    Ok(Json(backups))
}

//! Data directory management
//!
//! Everything the gateway persists lives under one data directory: the
//! SQLite database, uploaded documents, and downloadable backup snapshots.
//! `DB_PATH` and `UPLOADS_DIR` override the individual locations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::config::AppConfig;
use super::constants::{APP_DOT_FOLDER, APP_NAME, ENV_DATA_DIR, SQLITE_DB_FILENAME};

/// Data subdirectories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSubdir {
    Sqlite,
    Uploads,
    Backups,
}

impl DataSubdir {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DataSubdir::Sqlite => "sqlite",
            DataSubdir::Uploads => "uploads",
            DataSubdir::Backups => "backups",
        }
    }

    pub const fn all() -> &'static [DataSubdir] {
        &[DataSubdir::Sqlite, DataSubdir::Uploads, DataSubdir::Backups]
    }
}

/// Application storage manager
#[derive(Debug, Clone)]
pub struct AppStorage {
    data_dir: PathBuf,
    db_path: PathBuf,
    uploads_dir: PathBuf,
    backups_dir: PathBuf,
}

impl AppStorage {
    /// Initialize storage, creating the data directory and subdirectories
    pub async fn init(config: &AppConfig) -> Result<Self> {
        let data_dir = Self::resolve_data_dir();

        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        for subdir in DataSubdir::all() {
            let path = data_dir.join(subdir.as_str());
            tokio::fs::create_dir_all(&path).await.with_context(|| {
                format!("Failed to create {} directory: {}", subdir.as_str(), path.display())
            })?;
        }

        // Canonicalize after creation for clean paths in logs
        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);

        let db_path = match &config.db_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await.with_context(|| {
                        format!("Failed to create database directory: {}", parent.display())
                    })?;
                }
                path.clone()
            }
            None => data_dir
                .join(DataSubdir::Sqlite.as_str())
                .join(SQLITE_DB_FILENAME),
        };

        let uploads_dir = match &config.uploads_dir {
            Some(path) => {
                tokio::fs::create_dir_all(path).await.with_context(|| {
                    format!("Failed to create uploads directory: {}", path.display())
                })?;
                path.clone()
            }
            None => data_dir.join(DataSubdir::Uploads.as_str()),
        };

        let backups_dir = data_dir.join(DataSubdir::Backups.as_str());

        tracing::debug!(data_dir = %data_dir.display(), "Storage initialized");

        Ok(Self {
            data_dir,
            db_path,
            uploads_dir,
            backups_dir,
        })
    }

    /// Resolve the data directory from env var or platform default
    pub fn resolve_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(ENV_DATA_DIR)
            && !dir.trim().is_empty()
        {
            return PathBuf::from(dir);
        }

        if let Some(base) = dirs::data_dir() {
            return base.join(APP_NAME);
        }

        // Fallback to local .chatrelay
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        cwd.join(APP_DOT_FOLDER)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }
}

//! Uploaded document storage
//!
//! Flat filename-keyed storage under the uploads root. Every access path is
//! canonicalized and must resolve to a descendant of the root; anything else
//! fails as NotFound. The caller cannot distinguish a traversal attempt
//! from a missing file, and learns nothing about the filesystem.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Document not found: {name}")]
    NotFound { name: String },

    #[error("Upload lacks a filename")]
    MissingFilename,

    #[error("Failed to save document: {0}")]
    Save(std::io::Error),

    #[error("Failed to delete document: {0}")]
    Delete(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stored document metadata
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentMeta {
    pub filename: String,
    pub size_bytes: u64,
    pub modified_at: i64,
}

/// Filename-keyed document store rooted at the uploads directory
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Open the store, creating and canonicalizing the root
    pub async fn init(root: &Path) -> Result<Self, DocumentError> {
        fs::create_dir_all(root).await?;
        let root = root.canonicalize()?;
        tracing::debug!(root = %root.display(), "Document store initialized");
        Ok(Self { root })
    }

    /// Validate a filename for saving: a single non-empty path component
    fn sanitize(name: &str) -> Result<&str, DocumentError> {
        if name.trim().is_empty() {
            return Err(DocumentError::MissingFilename);
        }
        let component_ok = !name.contains('/')
            && !name.contains('\\')
            && name != "."
            && name != ".."
            && !name.contains('\0');
        if !component_ok {
            return Err(DocumentError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(name)
    }

    /// Resolve an existing document: canonicalize and verify the result is
    /// a descendant of the root. Escapes collapse to NotFound.
    fn resolve(&self, name: &str) -> Result<PathBuf, DocumentError> {
        let not_found = || DocumentError::NotFound {
            name: name.to_string(),
        };

        if name.trim().is_empty() {
            return Err(not_found());
        }

        let candidate = self.root.join(name);
        let resolved = candidate.canonicalize().map_err(|_| not_found())?;
        if !resolved.starts_with(&self.root) {
            tracing::warn!(name, "Rejected document path outside uploads root");
            return Err(not_found());
        }
        Ok(resolved)
    }

    /// Save a document, overwriting any previous content under the name
    pub async fn save(&self, name: &str, data: &[u8]) -> Result<DocumentMeta, DocumentError> {
        let name = Self::sanitize(name)?;
        let path = self.root.join(name);

        fs::write(&path, data).await.map_err(DocumentError::Save)?;

        tracing::debug!(name, size = data.len(), "Document stored");
        self.stat(name, &path).await
    }

    /// Read a document's content and guessed media type
    pub async fn read(&self, name: &str) -> Result<(Vec<u8>, String), DocumentError> {
        let path = self.resolve(name)?;

        // Read directly; ENOENT maps to NotFound rather than racing a
        // separate exists() check
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DocumentError::NotFound {
                    name: name.to_string(),
                }
            } else {
                DocumentError::Io(e)
            }
        })?;

        let mime = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string();
        Ok((data, mime))
    }

    /// List stored documents, newest modification first
    pub async fn list(&self) -> Result<Vec<DocumentMeta>, DocumentError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut documents = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            documents.push(DocumentMeta {
                filename,
                size_bytes: metadata.len(),
                modified_at: modified_unix(&metadata),
            });
        }

        documents.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(documents)
    }

    /// Delete a document
    pub async fn delete(&self, name: &str) -> Result<(), DocumentError> {
        let path = self.resolve(name)?;
        fs::remove_file(&path).await.map_err(DocumentError::Delete)?;
        tracing::debug!(name, "Document deleted");
        Ok(())
    }

    async fn stat(&self, name: &str, path: &Path) -> Result<DocumentMeta, DocumentError> {
        let metadata = fs::metadata(path).await.map_err(|_| DocumentError::NotFound {
            name: name.to_string(),
        })?;
        Ok(DocumentMeta {
            filename: name.to_string(),
            size_bytes: metadata.len(),
            modified_at: modified_unix(&metadata),
        })
    }
}

fn modified_unix(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::init(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_save_read_roundtrip() {
        let (_dir, store) = test_store().await;

        let meta = store.save("notes.txt", b"hello").await.unwrap();
        assert_eq!(meta.filename, "notes.txt");
        assert_eq!(meta.size_bytes, 5);

        let (data, mime) = store.read("notes.txt").await.unwrap();
        assert_eq!(data, b"hello");
        assert_eq!(mime, "text/plain");
    }

    #[tokio::test]
    async fn test_missing_filename_rejected() {
        let (_dir, store) = test_store().await;
        let err = store.save("", b"data").await.unwrap_err();
        assert!(matches!(err, DocumentError::MissingFilename));
        let err = store.save("   ", b"data").await.unwrap_err();
        assert!(matches!(err, DocumentError::MissingFilename));
    }

    #[tokio::test]
    async fn test_traversal_reads_as_not_found() {
        let (_dir, store) = test_store().await;
        store.save("inside.txt", b"ok").await.unwrap();

        for name in ["../etc/passwd", "a/../../b", "..", "/etc/passwd"] {
            let err = store.read(name).await.unwrap_err();
            assert!(
                matches!(err, DocumentError::NotFound { .. }),
                "{name} should be NotFound, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_save_rejects_path_components() {
        let (_dir, store) = test_store().await;
        let err = store.save("../escape.txt", b"x").await.unwrap_err();
        assert!(matches!(err, DocumentError::NotFound { .. }));
        let err = store.save("nested/file.txt", b"x").await.unwrap_err();
        assert!(matches!(err, DocumentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let (_dir, store) = test_store().await;
        store.save("a.txt", b"aa").await.unwrap();
        store.save("b.md", b"bbb").await.unwrap();

        let docs = store.list().await.unwrap();
        assert_eq!(docs.len(), 2);

        store.delete("a.txt").await.unwrap();
        let docs = store.list().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].filename, "b.md");

        let err = store.read("a.txt").await.unwrap_err();
        assert!(matches!(err, DocumentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (_dir, store) = test_store().await;
        let err = store.delete("ghost.txt").await.unwrap_err();
        assert!(matches!(err, DocumentError::NotFound { .. }));
    }
}

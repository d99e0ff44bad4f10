//! Blob persistence for novel state.
//!
//! The engine serializes each novel (analysis records plus index snapshot)
//! to one opaque blob keyed by novel id. The store decides where blobs
//! live; JSON files under a data directory match the original layout.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Persists one blob per novel id.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `blob` under `novel_id`, replacing any previous value.
    async fn save(&self, novel_id: &str, blob: &[u8]) -> Result<()>;

    /// Load the blob for `novel_id`, or `None` when nothing is stored.
    async fn load(&self, novel_id: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the blob for `novel_id`. Removing a missing id is not an error.
    async fn delete(&self, novel_id: &str) -> Result<()>;

    /// All stored novel ids, unordered.
    async fn list(&self) -> Result<Vec<String>>;
}

/// Non-persistent store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn save(&self, novel_id: &str, blob: &[u8]) -> Result<()> {
        self.blobs
            .write()
            .await
            .insert(novel_id.to_string(), blob.to_vec());
        Ok(())
    }

    async fn load(&self, novel_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(novel_id).cloned())
    }

    async fn delete(&self, novel_id: &str) -> Result<()> {
        self.blobs.write().await.remove(novel_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.blobs.read().await.keys().cloned().collect())
    }
}

/// One JSON file per novel id under a data directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    data_dir: PathBuf,
}

impl FileBlobStore {
    /// Create a store rooted at `data_dir`. The directory is created on
    /// first save.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Ids may come from user input; keep them inside the data dir.
    fn path_for(&self, novel_id: &str) -> Result<PathBuf> {
        if novel_id.is_empty()
            || novel_id
                .chars()
                .any(|c| !c.is_ascii_alphanumeric() && c != '-' && c != '_')
        {
            return Err(Error::Input(format!(
                "invalid novel id {novel_id:?}: use alphanumerics, '-' and '_'"
            )));
        }
        Ok(self.data_dir.join(format!("{novel_id}.json")))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn save(&self, novel_id: &str, blob: &[u8]) -> Result<()> {
        let path = self.path_for(novel_id)?;
        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::write(&path, blob).await?;
        tracing::debug!(novel_id, bytes = blob.len(), "saved novel blob");
        Ok(())
    }

    async fn load(&self, novel_id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(novel_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, novel_id: &str) -> Result<()> {
        let path = self.path_for(novel_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            if let Some(stem) = name.to_string_lossy().strip_suffix(".json") {
                ids.push(stem.to_string());
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryBlobStore::new();
        store.save("novel-1", b"payload").await.expect("save");
        assert_eq!(
            store.load("novel-1").await.expect("load"),
            Some(b"payload".to_vec())
        );
        store.delete("novel-1").await.expect("delete");
        assert_eq!(store.load("novel-1").await.expect("load"), None);
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileBlobStore::new(dir.path());
        store.save("novel_a", b"{\"ok\":true}").await.expect("save");
        assert_eq!(
            store.load("novel_a").await.expect("load"),
            Some(b"{\"ok\":true}".to_vec())
        );
        let ids = store.list().await.expect("list");
        assert_eq!(ids, vec!["novel_a".to_string()]);
        store.delete("novel_a").await.expect("delete");
        assert_eq!(store.load("novel_a").await.expect("load"), None);
    }

    #[tokio::test]
    async fn test_file_store_missing_id_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileBlobStore::new(dir.path());
        assert_eq!(store.load("nothing").await.expect("load"), None);
        store.delete("nothing").await.expect("delete is idempotent");
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_traversal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileBlobStore::new(dir.path());
        let err = store.save("../evil", b"x").await.unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }
}

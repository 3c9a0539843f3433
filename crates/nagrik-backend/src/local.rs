use crate::traits::{BackendError, BackendResult, FileStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem file store.
///
/// Blobs live at `{root}/{bucket}/{path}`. Used by the Postgres backend
/// (and by demos) in place of a hosted object store.
#[derive(Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Create a new store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> BackendResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            BackendError::Config(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalFileStore { root })
    }

    /// Convert bucket + path to a filesystem path, rejecting traversal.
    fn blob_path(&self, bucket: &str, path: &str) -> BackendResult<PathBuf> {
        for segment in [bucket, path] {
            if segment.contains("..") || segment.starts_with('/') || segment.is_empty() {
                return Err(BackendError::Storage(format!(
                    "Invalid storage path: {}/{}",
                    bucket, path
                )));
            }
        }
        Ok(self.root.join(bucket).join(path))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> BackendResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn store(
        &self,
        bucket: &str,
        path: &str,
        _content_type: &str,
        data: Bytes,
    ) -> BackendResult<()> {
        let full = self.blob_path(bucket, path)?;
        self.ensure_parent_dir(&full).await?;

        fs::write(&full, &data)
            .await
            .map_err(|e| BackendError::Storage(format!("Write failed for {}: {}", path, e)))?;

        tracing::debug!(
            bucket = bucket,
            path = path,
            size = data.len(),
            "Stored file"
        );
        Ok(())
    }

    async fn load(&self, bucket: &str, path: &str) -> BackendResult<Bytes> {
        let full = self.blob_path(bucket, path)?;
        match fs::read(&full).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BackendError::NotFound(
                format!("{}/{}", bucket, path),
            )),
            Err(e) => Err(BackendError::Storage(format!(
                "Read failed for {}: {}",
                path, e
            ))),
        }
    }

    async fn exists(&self, bucket: &str, path: &str) -> BackendResult<bool> {
        let full = self.blob_path(bucket, path)?;
        match fs::metadata(&full).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BackendError::Storage(format!(
                "Stat failed for {}: {}",
                path, e
            ))),
        }
    }

    async fn delete(&self, bucket: &str, path: &str) -> BackendResult<()> {
        let full = self.blob_path(bucket, path)?;
        match fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BackendError::NotFound(
                format!("{}/{}", bucket, path),
            )),
            Err(e) => Err(BackendError::Storage(format!(
                "Delete failed for {}: {}",
                path, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (tempfile::TempDir, LocalFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_store_and_load_round_trip() {
        let (_dir, store) = test_store().await;
        store
            .store(
                "documents",
                "identity/a.pdf",
                "application/pdf",
                Bytes::from_static(b"%PDF-1.4"),
            )
            .await
            .unwrap();

        let data = store.load("documents", "identity/a.pdf").await.unwrap();
        assert_eq!(&data[..], b"%PDF-1.4");
        assert!(store.exists("documents", "identity/a.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let (_dir, store) = test_store().await;
        let err = store.load("documents", "identity/missing.pdf").await;
        assert!(matches!(err, Err(BackendError::NotFound(_))));
        assert!(!store
            .exists("documents", "identity/missing.pdf")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let (_dir, store) = test_store().await;
        let err = store
            .store(
                "documents",
                "../outside.pdf",
                "application/pdf",
                Bytes::from_static(b"x"),
            )
            .await;
        assert!(matches!(err, Err(BackendError::Storage(_))));

        let err = store.load("/etc", "passwd").await;
        assert!(matches!(err, Err(BackendError::Storage(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let (_dir, store) = test_store().await;
        store
            .store("documents", "identity/b.pdf", "application/pdf", Bytes::from_static(b"x"))
            .await
            .unwrap();
        store.delete("documents", "identity/b.pdf").await.unwrap();
        assert!(!store.exists("documents", "identity/b.pdf").await.unwrap());
    }
}

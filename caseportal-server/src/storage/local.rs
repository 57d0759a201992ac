//! Filesystem-backed blob store

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use super::{validate_path, BlobStore, StorageError};

/// Stores each blob as a file under `root`, keyed by its storage path.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, path: &str, bytes: Bytes) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StorageError::AlreadyExists(path.to_owned()),
                _ => StorageError::Io(e),
            })?;

        file.write_all(&bytes).await?;
        file.flush().await?;

        tracing::debug!(path, size = bytes.len(), "blob stored");
        Ok(())
    }

    async fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        for path in paths {
            let target = self.resolve(path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => tracing::debug!(path = %path, "blob removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(path = %path, "blob already absent")
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(path.to_owned())),
            Err(e) => Err(e.into()),
        }
    }
}

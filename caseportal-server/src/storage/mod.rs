//! Blob storage for case attachments
//!
//! Bytes go through a [`BlobStore`]; downloads are handed out as short-lived
//! signed URLs instead of being streamed through the case API.

pub mod local;
pub mod signing;

use async_trait::async_trait;
use bytes::Bytes;

pub use local::LocalBlobStore;
pub use signing::{SignedUrl, UrlSigner, DOWNLOAD_URL_TTL_SECS};

/// Storage error type
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid storage path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("blob '{0}' not found")]
    NotFound(String),

    #[error("blob '{0}' already exists")]
    AlreadyExists(String),

    #[error("signature does not match")]
    BadSignature,

    #[error("signed url expired")]
    Expired,
}

/// Blob storage backend
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Store `bytes` at `path`. Never overwrites an existing blob.
    async fn upload(&self, path: &str, bytes: Bytes) -> Result<(), StorageError>;

    /// Remove blobs. Paths that do not exist are skipped.
    async fn remove(&self, paths: &[String]) -> Result<(), StorageError>;

    /// Read a blob back in full.
    async fn read(&self, path: &str) -> Result<Bytes, StorageError>;
}

/// Check a storage key is a relative path made of plain segments.
pub fn validate_path(path: &str) -> Result<(), StorageError> {
    let invalid = |reason| StorageError::InvalidPath {
        path: path.to_owned(),
        reason,
    };

    if path.is_empty() {
        return Err(invalid("empty"));
    }
    if path.starts_with('/') {
        return Err(invalid("must be relative"));
    }
    if path.contains('\\') || path.contains('\0') {
        return Err(invalid("contains a forbidden character"));
    }
    if path
        .split('/')
        .any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(invalid("contains an empty or relative segment"));
    }

    Ok(())
}

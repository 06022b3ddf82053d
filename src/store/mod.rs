//! Blob store abstraction.
//!
//! The pipeline hands encoded images to a [`BlobStore`], which writes the
//! object and resolves the URL it is publicly served from.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             UploadPipeline              │
//! └────────────────────┬────────────────────┘
//!                      │  put_object / public_url
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            BlobStore Trait              │
//! └────────────────────┬────────────────────┘
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │  S3BlobStore    │    │   FsBlobStore       │
//! │ (S3 / MinIO)    │    │ (local directory)   │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! Stores never overwrite: writing to an existing path fails with
//! [`StoreError::Conflict`]. Choosing unique paths is the caller's job; see
//! [`keys`] for the path helpers the CLI uses.

mod fs;
pub mod keys;
mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::StoreError;

pub use fs::FsBlobStore;
pub use s3::{create_s3_client, default_public_base, S3BlobStore, DEFAULT_CACHE_CONTROL};

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectOutput {
    /// Path of the object inside the store, after any store-side prefixing.
    pub resolved_path: String,
}

/// Object storage used as the pipeline's upload destination.
///
/// Implementations must be safe to share across concurrent uploads to
/// distinct paths.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` at `path`. Fails with [`StoreError::Conflict`] if an
    /// object already exists there.
    async fn put_object(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<PutObjectOutput, StoreError>;

    /// Public URL of an object previously written. Pure and infallible.
    fn public_url(&self, resolved_path: &str) -> String;

    /// Human-readable identifier (e.g. `s3://bucket`) for logs.
    fn identifier(&self) -> &str;
}

/// Reject paths that are empty, absolute, or contain a `..` segment.
pub fn validate_object_path(path: &str) -> Result<(), StoreError> {
    if path.is_empty() {
        return Err(StoreError::InvalidPath("path is empty".to_string()));
    }
    if path.starts_with('/') {
        return Err(StoreError::InvalidPath(format!(
            "path must be relative: {}",
            path
        )));
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(StoreError::InvalidPath(format!(
            "path must not contain '..': {}",
            path
        )));
    }
    Ok(())
}

/// Join a base URL and an object path, percent-encoding each segment.
pub fn join_public_url(base: &Url, resolved_path: &str) -> String {
    let encoded: Vec<_> = resolved_path
        .split('/')
        .map(urlencoding::encode)
        .collect();
    format!("{}/{}", base.as_str().trim_end_matches('/'), encoded.join("/"))
}

//! Local filesystem blob store.
//!
//! Useful for development and for serving uploads from a static directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use super::{join_public_url, validate_object_path, BlobStore, PutObjectOutput};
use crate::error::StoreError;

/// Prefix of the temporary files objects are staged in.
const TEMP_PREFIX: &str = ".uplink-";

/// Filesystem-backed implementation of [`BlobStore`].
///
/// Objects are files below `root`. Each object is staged in a temporary
/// file and linked into place without replacing an existing file, so an
/// object path only ever holds complete data.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base: Url,
    identifier: String,
}

impl FsBlobStore {
    /// Create (if needed) the root directory and serve objects as `file://` URLs.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            StoreError::Io(format!(
                "failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;
        let root = fs::canonicalize(&root).await?;

        let public_base = Url::from_directory_path(&root).map_err(|_| {
            StoreError::InvalidPath(format!("cannot express {} as a URL", root.display()))
        })?;
        let identifier = format!("file://{}", root.display());

        Ok(Self {
            root,
            public_base,
            identifier,
        })
    }

    /// Serve objects under `public_base` instead of `file://` URLs.
    pub fn with_public_base(mut self, public_base: Url) -> Self {
        self.public_base = public_base;
        self
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` to a hidden temporary file next to `full_path`, then move
    /// it into place only if nothing exists there yet.
    ///
    /// Until the final step the object path does not exist. Dropping this
    /// future at any await point drops the temporary file, which deletes it.
    async fn write_new(&self, full_path: &Path, data: &[u8]) -> Result<(), StoreError> {
        let dir = full_path.parent().unwrap_or(self.root.as_path());
        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)?;

        let mut file = fs::File::from_std(temp.as_file().try_clone()?);
        file.write_all(data).await?;
        file.flush().await?;
        drop(file);

        temp.persist_noclobber(full_path).map_err(|e| {
            debug!(path = %full_path.display(), error = %e.error, "Discarding temporary object");
            StoreError::from(e.error)
        })?;

        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put_object(
        &self,
        path: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<PutObjectOutput, StoreError> {
        validate_object_path(path)?;

        let full_path = self.root.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        debug!(path = %full_path.display(), bytes = data.len(), "Writing object");
        self.write_new(&full_path, &data).await.map_err(|e| match e {
            StoreError::Conflict(_) => StoreError::Conflict(path.to_string()),
            other => other,
        })?;

        Ok(PutObjectOutput {
            resolved_path: path.to_string(),
        })
    }

    fn public_url(&self, resolved_path: &str) -> String {
        join_public_url(&self.public_base, resolved_path)
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

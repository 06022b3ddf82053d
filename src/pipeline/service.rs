//! Upload pipeline for orchestrating optimization and storage.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        UploadPipeline                           │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                      upload()                           │    │
//! │  │  1. Validate path/options   4. Decode, resample, encode │    │
//! │  │  2. Probe dimensions        5. put_object               │    │
//! │  │  3. Compute target size     6. Resolve public URL       │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                    │           │
//! │           ▼                    ▼                    ▼           │
//! │    ┌────────────┐     ┌─────────────────┐    ┌─────────────┐    │
//! │    │   probe    │     │ ImageTranscoder │    │  BlobStore  │    │
//! │    └────────────┘     └─────────────────┘    └─────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Probe and transcode run on the blocking thread pool. Every stage is a
//! suspension point where a [`CancellationToken`] is honoured; a cancelled
//! pipeline never reaches `put_object`, or drops the in-flight request if it
//! was already sent.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::{PipelineError, Stage};
use crate::imaging::{
    calculate_target_dimensions, Dimensions, ImageTranscoder, OptimizationOptions,
    OptimizedImage, SourceImage,
};
use crate::store::{validate_object_path, BlobStore};

/// Default number of files processed at once by [`UploadPipeline::upload_batch`].
pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;

// =============================================================================
// Results
// =============================================================================

/// Location of an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObjectRef {
    /// Path inside the store
    pub path: String,

    /// URL the object is publicly served from
    pub public_url: String,
}

/// One file of a batch upload.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub source: SourceImage,
    pub path: String,
}

impl BatchItem {
    pub fn new(source: SourceImage, path: impl Into<String>) -> Self {
        Self {
            source,
            path: path.into(),
        }
    }
}

// =============================================================================
// Upload Pipeline
// =============================================================================

/// Optimizes images and uploads them to a [`BlobStore`].
///
/// The store is injected at construction, so tests can substitute an
/// in-memory implementation.
///
/// # Example
///
/// ```ignore
/// use image_uplink::{OptimizationOptions, SourceImage, UploadPipeline};
///
/// let pipeline = UploadPipeline::new(store);
/// let source = SourceImage::new("photo.png", bytes);
/// let stored = pipeline
///     .upload(source, "about/photo.webp", &OptimizationOptions::default())
///     .await?;
/// println!("{}", stored.public_url);
/// ```
pub struct UploadPipeline<S: BlobStore> {
    store: Arc<S>,
    transcoder: ImageTranscoder,
}

impl<S: BlobStore> UploadPipeline<S> {
    /// Create a pipeline writing to `store`.
    pub fn new(store: S) -> Self {
        Self::with_shared_store(Arc::new(store))
    }

    /// Create a pipeline sharing a store with other components.
    pub fn with_shared_store(store: Arc<S>) -> Self {
        Self {
            store,
            transcoder: ImageTranscoder::new(),
        }
    }

    /// Get the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Probe, resize and transcode without uploading.
    pub async fn optimize(
        &self,
        source: &SourceImage,
        options: &OptimizationOptions,
    ) -> Result<OptimizedImage, PipelineError> {
        options.validate()?;
        optimize_stages(&self.transcoder, source, options, &CancellationToken::new()).await
    }

    /// Optimize `source` and upload it to `path`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidOptions`] or an invalid path, before any work
    /// - [`PipelineError::Decode`] if the source is not a readable image
    /// - [`PipelineError::Encode`] if re-encoding fails
    /// - [`PipelineError::Upload`] if the store rejects the object
    pub async fn upload(
        &self,
        source: SourceImage,
        path: &str,
        options: &OptimizationOptions,
    ) -> Result<StoredObjectRef, PipelineError> {
        self.upload_with_cancel(source, path, options, &CancellationToken::new())
            .await
    }

    /// [`upload`](Self::upload), aborting at the next stage boundary once
    /// `cancel` fires.
    pub async fn upload_with_cancel(
        &self,
        source: SourceImage,
        path: &str,
        options: &OptimizationOptions,
        cancel: &CancellationToken,
    ) -> Result<StoredObjectRef, PipelineError> {
        let span = info_span!("upload", file = %source.filename, path = %path);

        async {
            let result = self.run(&source, path, options, cancel).await;
            match &result {
                Ok(stored) => info!(url = %stored.public_url, "Uploaded"),
                Err(e) => warn!(stage = %e.stage(), error = %e, "Upload failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Upload several files, at most `concurrency` at a time.
    ///
    /// Each file runs its own pipeline; a failure only affects that file's
    /// entry. Results are returned in the order of `items`.
    pub async fn upload_batch(
        &self,
        items: Vec<BatchItem>,
        options: &OptimizationOptions,
        concurrency: usize,
    ) -> Vec<Result<StoredObjectRef, PipelineError>> {
        self.upload_batch_with_cancel(items, options, concurrency, &CancellationToken::new())
            .await
    }

    /// [`upload_batch`](Self::upload_batch) with a token shared by every file.
    pub async fn upload_batch_with_cancel(
        &self,
        items: Vec<BatchItem>,
        options: &OptimizationOptions,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> Vec<Result<StoredObjectRef, PipelineError>> {
        debug!(files = items.len(), concurrency, "Starting batch upload");

        stream::iter(items)
            .map(|item| async move {
                self.upload_with_cancel(item.source, &item.path, options, cancel)
                    .await
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    async fn run(
        &self,
        source: &SourceImage,
        path: &str,
        options: &OptimizationOptions,
        cancel: &CancellationToken,
    ) -> Result<StoredObjectRef, PipelineError> {
        options.validate()?;
        validate_object_path(path)?;
        debug!(stage = %Stage::Received, bytes = source.data.len(), "Accepted source");

        let optimized = optimize_stages(&self.transcoder, source, options, cancel).await?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                stage: Stage::Upload,
            });
        }

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(PipelineError::Cancelled { stage: Stage::Upload });
            }
            result = self.store.put_object(path, optimized.data, optimized.content_type) => result?,
        };

        let public_url = self.store.public_url(&output.resolved_path);
        Ok(StoredObjectRef {
            path: output.resolved_path,
            public_url,
        })
    }
}

async fn optimize_stages(
    transcoder: &ImageTranscoder,
    source: &SourceImage,
    options: &OptimizationOptions,
    cancel: &CancellationToken,
) -> Result<OptimizedImage, PipelineError> {
    let hint = source.format_hint();

    // Probe
    let data = source.data.clone();
    let dimensions = run_blocking(Stage::Probe, cancel, move || {
        crate::imaging::probe_with_hint(&data, hint)
    })
    .await?;
    debug!(
        stage = %Stage::Probe,
        width = dimensions.width,
        height = dimensions.height,
        "Probed source"
    );

    // Resize
    let bounds = Dimensions {
        width: options.max_width,
        height: options.max_height,
    };
    let target = calculate_target_dimensions(dimensions, bounds, options.allow_upscale);
    debug!(
        stage = %Stage::Resize,
        width = target.width,
        height = target.height,
        "Computed target size"
    );

    // Encode
    let transcoder = transcoder.clone();
    let data: Bytes = source.data.clone();
    let filename = source.filename.clone();
    let format = options.format;
    let quality = options.quality;
    let optimized = run_blocking(Stage::Encode, cancel, move || {
        transcoder.transcode(&data, hint, &filename, target, format, quality)
    })
    .await?;
    debug!(
        stage = %Stage::Encode,
        bytes = optimized.data.len(),
        content_type = optimized.content_type,
        "Encoded"
    );

    Ok(optimized)
}

/// Probe, resize and transcode `source` without a store.
///
/// Used for dry runs and local output.
pub async fn optimize_image(
    source: &SourceImage,
    options: &OptimizationOptions,
) -> Result<OptimizedImage, PipelineError> {
    options.validate()?;
    optimize_stages(&ImageTranscoder::new(), source, options, &CancellationToken::new()).await
}

/// Run CPU-bound work on the blocking pool, racing it against `cancel`.
///
/// On cancellation the closure still runs to completion in the background;
/// its buffers are dropped when it returns.
async fn run_blocking<T, F>(
    stage: Stage,
    cancel: &CancellationToken,
    work: F,
) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled { stage });
    }

    let handle = tokio::task::spawn_blocking(work);

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled { stage }),
        joined = handle => match joined {
            Ok(result) => result,
            Err(e) if stage == Stage::Probe => Err(PipelineError::decode(e)),
            Err(e) => Err(PipelineError::encode(e)),
        },
    }
}

// =============================================================================
// Tests
// =============================================================================

//! # Image Uplink
//!
//! Optimizes user-supplied images and uploads them to blob storage.
//!
//! Every image is probed for its dimensions, fitted inside a bounding box
//! with its aspect ratio preserved, resampled and re-encoded as WebP, JPEG
//! or PNG, then written to an S3-compatible bucket or a local directory.
//! The caller gets back the object's public URL.
//!
//! ## Architecture
//!
//! - [`imaging`] - Dimension probe, bounded resize and transcoder
//! - [`store`] - Blob store trait with S3 and filesystem implementations
//! - [`pipeline`] - Stage orchestration, cancellation and batch fan-out
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```rust,no_run
//! use image_uplink::{FsBlobStore, OptimizationOptions, SourceImage, UploadPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FsBlobStore::new("./public/media").await?;
//!     let pipeline = UploadPipeline::new(store);
//!
//!     let bytes = std::fs::read("photo.png")?;
//!     let stored = pipeline
//!         .upload(
//!             SourceImage::new("photo.png", bytes),
//!             "about/photo.webp",
//!             &OptimizationOptions::default(),
//!         )
//!         .await?;
//!
//!     println!("{}", stored.public_url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod imaging;
pub mod pipeline;
pub mod store;


// Re-export commonly used types
pub use config::{
    Cli, Command, ImageArgs, OptimizeConfig, ProbeConfig, StoreArgs, StoreBackend, UploadConfig,
};
pub use error::{PipelineError, Stage, StoreError};
pub use imaging::{
    calculate_target_dimensions, optimized_filename, probe_dimensions, Dimensions,
    ImageTranscoder, OptimizationOptions, OptimizedImage, OutputFormat, SourceImage,
};
pub use pipeline::{optimize_image, BatchItem, StoredObjectRef, UploadPipeline};
pub use store::{create_s3_client, BlobStore, FsBlobStore, PutObjectOutput, S3BlobStore};

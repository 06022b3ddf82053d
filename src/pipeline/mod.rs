//! Optimization and upload orchestration.
//!
//! Each file moves through a fixed sequence of stages:
//!
//! ```text
//! Received ─▶ Probed ─▶ Resized ─▶ Encoded ─▶ Uploaded
//!     │          │          │          │
//!     └──────────┴──────────┴──────────┴──▶ Failed(stage, cause)
//! ```
//!
//! There are no retries and nothing is persisted between stages. Files in a
//! batch share no state, so one file failing leaves the others untouched.
//!
//! # Components
//!
//! - [`UploadPipeline`]: Runs the stages for one file or a batch
//! - [`StoredObjectRef`]: Path and public URL of an uploaded image
//! - [`BatchItem`]: A source image paired with its destination path

mod service;

pub use service::{
    optimize_image, BatchItem, StoredObjectRef, UploadPipeline, DEFAULT_BATCH_CONCURRENCY,
};

//! Image optimization stages.
//!
//! Each uploaded image passes through three stages before it reaches the
//! blob store:
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────────────┐
//! │    Probe     │ ─▶ │    Resize    │ ─▶ │      Transcode       │
//! │ (header only │    │ (bounded,    │    │ (decode → resample → │
//! │  dimensions) │    │  aspect-kept)│    │  webp/jpeg/png)      │
//! └──────────────┘    └──────────────┘    └──────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`probe_dimensions`]: Reads the pixel size from an encoded image
//! - [`calculate_target_dimensions`]: Fits a size inside a bounding box
//! - [`ImageTranscoder`]: Resamples and re-encodes into an [`OptimizedImage`]
//! - [`OptimizationOptions`]: Bounds, quality and output format for one call

mod encoder;
mod options;
mod probe;
mod resize;

pub use encoder::{
    encode_as, jpeg_quality, optimized_filename, webp_quality, ImageTranscoder, OptimizedImage,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use options::{
    OptimizationOptions, OutputFormat, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH, DEFAULT_QUALITY,
};
pub use probe::{probe_dimensions, Dimensions, SourceImage};
pub use resize::calculate_target_dimensions;
pub(crate) use probe::probe_with_hint;

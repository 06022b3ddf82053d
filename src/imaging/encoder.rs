//! Image transcoder.
//!
//! Decodes a source image, resamples it to the target size and re-encodes
//! it as WebP, JPEG or PNG.
//!
//! # Design Decisions
//!
//! - **Always decode/encode**: every upload is re-encoded, even when the
//!   source is already in the target format at the target size.
//!
//! - **Deterministic resampling**: the triangle (bilinear) filter is used for
//!   every resize so repeated runs on the same input give the same pixels.
//!
//! - **Quality**: a float in `(0, 1]`. WebP receives `quality * 100`, JPEG the
//!   same value rounded and clamped to 1..=100. PNG is lossless and ignores it.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder, ImageFormat};
use tracing::debug;

use super::options::OutputFormat;
use super::probe::{read_orientation, reader_for, Dimensions};
use crate::error::PipelineError;

/// Minimum JPEG quality accepted by the encoder.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum JPEG quality accepted by the encoder.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Re-encoded image ready for upload.
#[derive(Debug, Clone)]
pub struct OptimizedImage {
    /// Encoded bytes
    pub data: Bytes,

    /// `image/<format>`
    pub content_type: &'static str,

    /// Original stem with the new extension
    pub filename: String,

    /// Pixel size of the encoded image
    pub dimensions: Dimensions,

    pub format: OutputFormat,
}

// =============================================================================
// Transcoder
// =============================================================================

/// Decode, resample and re-encode images.
///
/// # Example
///
/// ```ignore
/// use image_uplink::imaging::{Dimensions, ImageTranscoder, OutputFormat};
///
/// let transcoder = ImageTranscoder::new();
/// let target = Dimensions::new(1920, 960).unwrap();
/// let optimized =
///     transcoder.transcode(&bytes, None, "photo.png", target, OutputFormat::Webp, 0.8)?;
/// assert_eq!(optimized.content_type, "image/webp");
/// ```
#[derive(Debug, Clone)]
pub struct ImageTranscoder {
    filter: FilterType,
}

impl Default for ImageTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageTranscoder {
    /// Create a transcoder using bilinear resampling.
    pub fn new() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }

    /// Create a transcoder with a different resampling filter.
    pub fn with_filter(filter: FilterType) -> Self {
        Self { filter }
    }

    /// Decode `data`, apply its EXIF orientation, resample to exactly
    /// `target` and encode as `format`.
    ///
    /// # Arguments
    ///
    /// * `data` - Encoded source image
    /// * `hint` - Format to assume when the bytes cannot be sniffed
    /// * `filename` - Original filename, used for the output name
    /// * `target` - Output pixel size
    /// * `format` - Output encoding
    /// * `quality` - Encoder quality in `(0, 1]`, ignored for PNG
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Decode`] if the source cannot be decoded and
    /// [`PipelineError::Encode`] if the codec fails.
    pub fn transcode(
        &self,
        data: &[u8],
        hint: Option<ImageFormat>,
        filename: &str,
        target: Dimensions,
        format: OutputFormat,
        quality: f32,
    ) -> Result<OptimizedImage, PipelineError> {
        let mut decoder = reader_for(data, hint)?
            .into_decoder()
            .map_err(PipelineError::decode)?;
        let orientation = read_orientation(&mut decoder);

        let mut img = DynamicImage::from_decoder(decoder).map_err(PipelineError::decode)?;
        // Pixels are laid out as displayed, matching the probed size.
        img.apply_orientation(orientation);

        let resized = self.rasterize(img, target);

        if !format.is_lossy() {
            debug!(quality, "PNG output is lossless, quality ignored");
        }

        let encoded = encode_as(&resized, format, quality)?;

        Ok(OptimizedImage {
            data: encoded,
            content_type: format.content_type(),
            filename: optimized_filename(filename, format),
            dimensions: target,
            format,
        })
    }

    /// Resample into a buffer of exactly `target` size.
    pub fn rasterize(&self, img: DynamicImage, target: Dimensions) -> DynamicImage {
        if img.width() == target.width && img.height() == target.height {
            return img;
        }
        img.resize_exact(target.width, target.height, self.filter)
    }
}

/// Encode pixel data as `format`.
pub fn encode_as(
    img: &DynamicImage,
    format: OutputFormat,
    quality: f32,
) -> Result<Bytes, PipelineError> {
    match format {
        OutputFormat::Webp => encode_webp(img, quality),
        OutputFormat::Jpeg => encode_jpeg(img, quality),
        OutputFormat::Png => write_png(img),
    }
}

fn encode_webp(img: &DynamicImage, quality: f32) -> Result<Bytes, PipelineError> {
    let rgba = img.to_rgba8();
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());

    let memory = encoder
        .encode_simple(false, webp_quality(quality))
        .map_err(|e| PipelineError::encode(format!("WebP encoding failed: {:?}", e)))?;

    Ok(Bytes::copy_from_slice(&memory))
}

fn encode_jpeg(img: &DynamicImage, quality: f32) -> Result<Bytes, PipelineError> {
    // JPEG has no alpha channel.
    let rgb = img.to_rgb8();

    let mut output = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut output, jpeg_quality(quality));
    encoder
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(PipelineError::encode)?;

    Ok(Bytes::from(output))
}

fn write_png(img: &DynamicImage) -> Result<Bytes, PipelineError> {
    let mut output = Cursor::new(Vec::new());
    img.write_with_encoder(PngEncoder::new(&mut output))
        .map_err(PipelineError::encode)?;

    Ok(Bytes::from(output.into_inner()))
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Map a `(0, 1]` quality to the libwebp `0..=100` scale.
#[inline]
pub fn webp_quality(quality: f32) -> f32 {
    (quality * 100.0).clamp(0.0, 100.0)
}

/// Map a `(0, 1]` quality to the JPEG `1..=100` scale.
#[inline]
pub fn jpeg_quality(quality: f32) -> u8 {
    ((quality * 100.0).round() as u8).clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

/// Output filename: the original name up to its final `.`, then `.<ext>`.
///
/// Names without an extension (including dot-files such as `.env`) keep
/// the whole name as the stem.
pub fn optimized_filename(original: &str, format: OutputFormat) -> String {
    let stem = match original.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => original,
    };
    format!("{}.{}", stem, format.extension())
}

// =============================================================================
// Tests
// =============================================================================

//! Dimension probe.
//!
//! Reads just enough of an image to report its pixel size. The format is
//! sniffed from the magic bytes; the declared media type is only a fallback
//! for buffers the sniffer does not recognise.
//!
//! Reported sizes are display sizes: an EXIF orientation that rotates by a
//! quarter turn swaps width and height.

use std::io::Cursor;

use bytes::Bytes;
use image::metadata::Orientation;
use image::{ImageDecoder, ImageFormat, ImageReader};

use crate::error::PipelineError;

/// Pixel dimensions, both strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Returns `None` if either axis is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            None
        } else {
            Some(Self { width, height })
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// A user-supplied image file as received.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl SourceImage {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            data: data.into(),
        }
    }

    /// Attach the declared media type (e.g. `image/png`).
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Probe the pixel dimensions of this image.
    pub fn probe(&self) -> Result<Dimensions, PipelineError> {
        probe_with_hint(&self.data, self.format_hint())
    }

    /// Format hint derived from the declared media type or file extension.
    pub(crate) fn format_hint(&self) -> Option<ImageFormat> {
        self.content_type
            .as_deref()
            .and_then(ImageFormat::from_mime_type)
            .or_else(|| ImageFormat::from_path(&self.filename).ok())
    }
}

/// Build a reader for `data`, sniffing the format and falling back to `hint`.
pub(crate) fn reader_for(
    data: &[u8],
    hint: Option<ImageFormat>,
) -> Result<ImageReader<Cursor<&[u8]>>, PipelineError> {
    if data.is_empty() {
        return Err(PipelineError::decode("empty file"));
    }

    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(PipelineError::decode)?;

    if reader.format().is_none() {
        match hint {
            Some(format) => reader.set_format(format),
            None => return Err(PipelineError::decode("unrecognized image format")),
        }
    }

    Ok(reader)
}

/// Report `(width, height)` of an encoded image without decoding its pixels.
///
/// # Errors
///
/// Returns [`PipelineError::Decode`] for zero-byte input, unrecognised or
/// corrupt data, and images reporting a zero-sized axis.
pub fn probe_dimensions(
    data: &[u8],
    declared_type: Option<&str>,
) -> Result<Dimensions, PipelineError> {
    probe_with_hint(data, declared_type.and_then(ImageFormat::from_mime_type))
}

pub(crate) fn probe_with_hint(
    data: &[u8],
    hint: Option<ImageFormat>,
) -> Result<Dimensions, PipelineError> {
    let mut decoder = reader_for(data, hint)?
        .into_decoder()
        .map_err(PipelineError::decode)?;

    let (stored_width, stored_height) = decoder.dimensions();
    let orientation = read_orientation(&mut decoder);

    // Displayed size: quarter turns swap the axes.
    let (width, height) = if swaps_axes(orientation) {
        (stored_height, stored_width)
    } else {
        (stored_width, stored_height)
    };

    Dimensions::new(width, height).ok_or_else(|| {
        PipelineError::decode(format!("image has zero-sized axis ({}x{})", width, height))
    })
}

/// EXIF orientation of the image, or no transform when absent or unreadable.
pub(crate) fn read_orientation(decoder: &mut impl ImageDecoder) -> Orientation {
    decoder.orientation().unwrap_or(Orientation::NoTransforms)
}

fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

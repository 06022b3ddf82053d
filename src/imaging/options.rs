//! Optimization options and output formats.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Default bounding box width.
pub const DEFAULT_MAX_WIDTH: u32 = 1920;

/// Default bounding box height.
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;

/// Default encoder quality in `(0, 1]`.
pub const DEFAULT_QUALITY: f32 = 0.8;

// =============================================================================
// Output Format
// =============================================================================

/// Target encoding for optimized images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Webp,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// File extension, also used as the media subtype.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
        }
    }

    /// Content type declared for the encoded bytes (`image/<format>`).
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Webp => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    /// Whether the quality setting changes the output.
    pub fn is_lossy(&self) -> bool {
        !matches!(self, OutputFormat::Png)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webp" => Ok(OutputFormat::Webp),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            other => Err(format!(
                "unsupported output format '{}' (expected webp, jpeg or png)",
                other
            )),
        }
    }
}

// =============================================================================
// Optimization Options
// =============================================================================

/// Per-call optimization settings.
///
/// Deserializes from the option record admin forms send, e.g.
/// `{"maxWidth": 1920, "maxHeight": 1080, "quality": 0.8, "format": "webp"}`.
/// Missing keys take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizationOptions {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: f32,
    pub format: OutputFormat,
    /// Scale images that already fit the bounds up to touch them.
    pub allow_upscale: bool,
}

impl Default for OptimizationOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            quality: DEFAULT_QUALITY,
            format: OutputFormat::default(),
            allow_upscale: false,
        }
    }
}

impl OptimizationOptions {
    /// Options with the given bounds and defaults elsewhere.
    pub fn with_bounds(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
            ..Self::default()
        }
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn allow_upscale(mut self, allow: bool) -> Self {
        self.allow_upscale = allow;
        self
    }

    /// Check bounds are positive and quality is in `(0, 1]`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(PipelineError::InvalidOptions(format!(
                "bounds must be positive, got {}x{}",
                self.max_width, self.max_height
            )));
        }
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(PipelineError::InvalidOptions(format!(
                "quality must be in (0, 1], got {}",
                self.quality
            )));
        }
        Ok(())
    }
}

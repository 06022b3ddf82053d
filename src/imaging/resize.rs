//! Aspect-preserving bounded resize calculation.
//!
//! Pure arithmetic, no I/O.

use super::probe::Dimensions;

/// Compute the size an image of `source` dimensions should be resampled to
/// so that it fits within `max` while keeping its aspect ratio.
///
/// The scale factor is `min(max.width / source.width, max.height / source.height)`.
/// When `allow_upscale` is false the factor is capped at 1, so images that
/// already fit are left at their original size. Each axis is rounded to the
/// nearest pixel and kept within `1..=max`.
///
/// # Examples
/// ```
/// # use image_uplink::imaging::{calculate_target_dimensions, Dimensions};
/// let source = Dimensions::new(4000, 2000).unwrap();
/// let max = Dimensions::new(1920, 1080).unwrap();
/// assert_eq!(
///     calculate_target_dimensions(source, max, false),
///     Dimensions::new(1920, 960).unwrap()
/// );
/// ```
pub fn calculate_target_dimensions(
    source: Dimensions,
    max: Dimensions,
    allow_upscale: bool,
) -> Dimensions {
    let scale_x = max.width as f64 / source.width as f64;
    let scale_y = max.height as f64 / source.height as f64;

    let mut scale = scale_x.min(scale_y);
    if !allow_upscale {
        scale = scale.min(1.0);
    }

    let width = scale_axis(source.width, scale, max.width);
    let height = scale_axis(source.height, scale, max.height);

    Dimensions { width, height }
}

#[inline]
fn scale_axis(value: u32, scale: f64, bound: u32) -> u32 {
    let scaled = (value as f64 * scale).round() as u32;
    scaled.clamp(1, bound)
}

//! Visualization builders for vessel masks
//!
//! Produces the two images the serving layer returns next to a diagnosis: a
//! red-tinted overlay of the vessels on the original photograph, and the
//! plain binary vessel map.

use image::{Rgb, RgbImage};

use crate::{SegmentationError, VesselMask};

// Blend weights for the red vessel tint: 0.6 original + 0.4 full red
const ORIGINAL_WEIGHT: f32 = 0.6;
const TINT_WEIGHT: f32 = 0.4;

/// Render the vessel overlay visualization
///
/// Vessel pixels have their red channel pushed toward full red
/// (`R = 0.6*R + 0.4*255`); green and blue channels and all non-vessel
/// pixels are byte-identical to the input. The input image is not modified.
///
/// # Errors
/// Returns [`SegmentationError::DimensionMismatch`] when the mask was not
/// built from an image of these dimensions.
pub fn render_vessel_overlay(
    image: &RgbImage,
    mask: &VesselMask,
) -> Result<RgbImage, SegmentationError> {
    if image.dimensions() != mask.dimensions() {
        let (mask_width, mask_height) = mask.dimensions();
        let (image_width, image_height) = image.dimensions();
        return Err(SegmentationError::DimensionMismatch {
            mask_width,
            mask_height,
            image_width,
            image_height,
        });
    }

    let mut overlay = image.clone();
    for (x, y, pixel) in overlay.enumerate_pixels_mut() {
        if mask.is_vessel(x, y) {
            let red = f32::from(pixel[0]);
            pixel[0] = (ORIGINAL_WEIGHT * red + TINT_WEIGHT * 255.0).round() as u8;
        }
    }
    Ok(overlay)
}

/// Render the binary vessel map as an RGB image
///
/// Vessel pixels come out white (255, 255, 255), background black.
#[must_use]
pub fn render_binary_map(mask: &VesselMask) -> RgbImage {
    let (width, height) = mask.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let value = if mask.is_vessel(x, y) { 255 } else { 0 };
        Rgb([value, value, value])
    })
}

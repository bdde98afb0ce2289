//! Shared preprocessing for the cascade classifiers
//!
//! Every stage model consumes the same dual-stream tensor pair: the vessel
//! mask and the green color channel, each resized to 288x288 and normalized
//! to [-1, 1]. The pair is computed once per image and reused across however
//! many stages the cascade visits.

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use ndarray::Array4;
use retina_vessel_segmentation::VesselMask;

/// Square input resolution of the stage classifiers
pub const CLASSIFIER_INPUT_SIZE: u32 = 288;

type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Preprocessed tensor pair shared by every cascade stage
///
/// Both arrays have shape `(1, 1, 288, 288)` with values in [-1, 1].
#[derive(Debug, Clone)]
pub struct ClassifierInputs {
    /// Normalized vessel-mask stream
    pub vessel: Array4<f32>,
    /// Normalized green-channel stream
    pub green: Array4<f32>,
}

/// Build the classifier tensor pair from an image and its vessel mask
///
/// The vessel stream comes from the mask resized with nearest-neighbor
/// interpolation (binary structure preserved); the green stream comes from
/// the green channel of the *original-resolution* image resized bilinearly
/// in floating point. Both streams are normalized `(v/255 - 0.5) / 0.5`.
#[must_use]
pub fn preprocess_for_classification(image: &RgbImage, mask: &VesselMask) -> ClassifierInputs {
    ClassifierInputs {
        vessel: vessel_tensor(mask.as_gray()),
        green: green_tensor(image),
    }
}

/// Map a 0-255 value into [-1, 1]
fn normalize(value: f32) -> f32 {
    (value / 255.0 - 0.5) / 0.5
}

fn vessel_tensor(mask: &GrayImage) -> Array4<f32> {
    let size = CLASSIFIER_INPUT_SIZE;
    let resized = image::imageops::resize(
        mask,
        size,
        size,
        image::imageops::FilterType::Nearest,
    );

    let mut values: Vec<f32> = resized.pixels().map(|p| f32::from(p[0])).collect();

    // Masks arrive either as 0/1 or 0/255; bring both onto the 0-255 scale
    // before normalizing
    let max = values.iter().fold(0.0_f32, |acc, &v| acc.max(v));
    if max <= 1.0 {
        for v in &mut values {
            *v *= 255.0;
        }
    }

    let size = size as usize;
    let mut array = Array4::<f32>::zeros((1, 1, size, size));
    for (i, &v) in values.iter().enumerate() {
        array[[0, 0, i / size, i % size]] = normalize(v);
    }
    array
}

fn green_tensor(image: &RgbImage) -> Array4<f32> {
    let size = CLASSIFIER_INPUT_SIZE;
    let (width, height) = image.dimensions();

    // Keep the green plane in floating point through the resize; stored as
    // green/255 so values sit in the [0, 1] range float resampling expects
    let mut green = GrayF32::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels() {
        green.put_pixel(x, y, Luma([f32::from(pixel[1]) / 255.0]));
    }
    let resized = image::imageops::resize(
        &green,
        size,
        size,
        image::imageops::FilterType::Triangle,
    );

    let size = size as usize;
    let mut array = Array4::<f32>::zeros((1, 1, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        array[[0, 0, y as usize, x as usize]] = normalize(pixel[0] * 255.0);
    }
    array
}

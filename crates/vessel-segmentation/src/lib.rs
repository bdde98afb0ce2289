//! Retinal blood-vessel segmentation via ONNX Runtime
//!
//! This module runs pixel-wise vessel segmentation on fundus photographs
//! using a U-Net style model exported to ONNX format. The model consumes the
//! green color channel (where vessels carry the most contrast) at a fixed
//! square resolution and emits a per-pixel vessel probability map, which is
//! thresholded into a binary mask and restored to the original resolution.
//!
//! # Features
//! - Binary vessel masks at the original image resolution
//! - Green-channel preprocessing scaled to [0, 1]
//! - fp16 input casting for half-precision model exports
//! - Hardware acceleration via ONNX Runtime (CUDA with CPU fallback)
//! - Overlay and binary-map visualizations (see [`overlay`])
//!
//! # Example
//! ```no_run
//! use retina_vessel_segmentation::{SegmentationConfig, VesselSegmenter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let segmenter = VesselSegmenter::new(
//!     "models/vessel_segmentation.onnx",
//!     SegmentationConfig::default(),
//! )?;
//!
//! let img = image::open("fundus.png")?.to_rgb8();
//! let mask = segmenter.segment(&img)?;
//!
//! println!("vessel coverage: {:.1}%", mask.coverage() * 100.0);
//! # Ok(())
//! # }
//! ```

pub mod overlay;

use half::f16;
use image::{GrayImage, Luma, RgbImage};
use ndarray::Array4;
use ort::{session::Session, value::TensorRef};
use retina_common::onnx::{create_optimized_session, OnnxError};
use retina_common::{Device, Precision, ProcessingError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration for vessel segmentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Square input resolution the model was trained at
    pub input_size: u32,
    /// Probability threshold for calling a pixel a vessel (strictly greater)
    pub threshold: f32,
    /// Compute device preference
    pub device: Device,
    /// Model weight precision; `Half` casts inputs to f16
    pub precision: Precision,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            input_size: 1024,
            threshold: 0.5,
            device: Device::default(),
            precision: Precision::default(),
        }
    }
}

/// Errors that can occur during vessel segmentation
#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("ONNX Runtime error: {0}")]
    OrtError(#[from] ort::Error),

    #[error("Model load error: {0}")]
    ModelLoad(#[from] OnnxError),

    #[error("Model contract violation: {0}")]
    ModelContract(String),

    #[error("Invalid model output shape: expected [1, H, W] or [1, 1, H, W], got {0:?}")]
    InvalidOutputShape(Vec<i64>),

    #[error("Invalid mask value: {0} (expected 0 or 1)")]
    InvalidMaskValue(u8),

    #[error("Mask is {mask_width}x{mask_height} but image is {image_width}x{image_height}")]
    DimensionMismatch {
        mask_width: u32,
        mask_height: u32,
        image_width: u32,
        image_height: u32,
    },
}

impl From<SegmentationError> for ProcessingError {
    fn from(err: SegmentationError) -> Self {
        match err {
            SegmentationError::ModelLoad(e) => ProcessingError::Model(e.to_string()),
            other => ProcessingError::Inference(other.to_string()),
        }
    }
}

/// Binary vessel mask at the original image resolution
///
/// Every pixel is exactly 0 (background) or 1 (vessel). Produced by
/// [`VesselSegmenter::segment`]; immutable once built.
#[derive(Debug, Clone)]
pub struct VesselMask {
    mask: GrayImage,
}

impl VesselMask {
    /// Wrap an existing binary image, validating that every pixel is 0 or 1
    ///
    /// # Errors
    /// Returns [`SegmentationError::InvalidMaskValue`] on any other value.
    pub fn from_binary(mask: GrayImage) -> Result<Self, SegmentationError> {
        for pixel in mask.pixels() {
            if pixel[0] > 1 {
                return Err(SegmentationError::InvalidMaskValue(pixel[0]));
            }
        }
        Ok(Self { mask })
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.mask.dimensions()
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    /// Whether the pixel at (x, y) was classified as vessel
    #[must_use]
    pub fn is_vessel(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y)[0] == 1
    }

    /// The underlying 0/1 grayscale image
    #[must_use]
    pub fn as_gray(&self) -> &GrayImage {
        &self.mask
    }

    /// Number of vessel pixels in the mask
    #[must_use]
    pub fn vessel_pixel_count(&self) -> u64 {
        self.mask.pixels().filter(|p| p[0] == 1).count() as u64
    }

    /// Fraction of the mask covered by vessels, in [0, 1]
    #[must_use]
    pub fn coverage(&self) -> f64 {
        let total = u64::from(self.mask.width()) * u64::from(self.mask.height());
        if total == 0 {
            return 0.0;
        }
        self.vessel_pixel_count() as f64 / total as f64
    }
}

/// Vessel segmenter using ONNX Runtime
///
/// Holds the session behind a mutex so a shared segmenter can be called from
/// multiple request handlers; runs serialize on the session.
pub struct VesselSegmenter {
    session: Mutex<Session>,
    config: SegmentationConfig,
    input_name: String,
    output_name: String,
}

impl VesselSegmenter {
    /// Create a new vessel segmenter
    ///
    /// # Arguments
    /// * `model_path` - Path to the vessel segmentation ONNX model
    /// * `config` - Segmentation configuration
    ///
    /// # Errors
    /// Returns error if model loading fails
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        config: SegmentationConfig,
    ) -> Result<Self, SegmentationError> {
        let model_path = model_path.as_ref();
        info!("Loading vessel segmentation model from {:?}", model_path);

        let session = create_optimized_session(model_path, config.device)?;

        let input_name = session
            .inputs
            .first()
            .ok_or_else(|| SegmentationError::ModelContract("model has no inputs".to_string()))?
            .name
            .clone();
        let output_name = session
            .outputs
            .first()
            .ok_or_else(|| SegmentationError::ModelContract("model has no outputs".to_string()))?
            .name
            .clone();

        debug!(
            "Vessel model loaded (input size: {}, precision: {})",
            config.input_size, config.precision
        );

        Ok(Self {
            session: Mutex::new(session),
            config,
            input_name,
            output_name,
        })
    }

    /// Segment vessels in a fundus photograph
    ///
    /// The image is resized to the model resolution, the green channel is
    /// scaled to [0, 1] and scored, and the thresholded mask is resized back
    /// to the original resolution with nearest-neighbor interpolation so it
    /// stays strictly binary.
    ///
    /// # Arguments
    /// * `image` - RGB fundus photograph, any resolution
    ///
    /// # Returns
    /// Binary vessel mask at the input resolution
    ///
    /// # Errors
    /// Returns error if inference fails or the model output has an
    /// unexpected shape
    pub fn segment(&self, image: &RgbImage) -> Result<VesselMask, SegmentationError> {
        let original_size = image.dimensions();

        let input = green_input_tensor(image, self.config.input_size);
        let (shape, logits) = self.run_session(&input)?;

        // Accept [1, H, W] and [1, 1, H, W] output layouts
        let (height, width) = match shape.len() {
            3 => (shape[1] as usize, shape[2] as usize),
            4 => (shape[2] as usize, shape[3] as usize),
            _ => return Err(SegmentationError::InvalidOutputShape(shape)),
        };

        let mut mask = mask_from_logits(&logits, width, height, self.config.threshold);
        if mask.dimensions() != original_size {
            mask = restore_resolution(&mask, original_size);
        }

        let mask = VesselMask { mask };
        debug!(
            "vessel segmentation complete ({} vessel pixels, coverage {:.4})",
            mask.vessel_pixel_count(),
            mask.coverage()
        );

        Ok(mask)
    }

    /// Run the session on a preprocessed input, casting to f16 when the
    /// model weights are half precision
    fn run_session(&self, input: &Array4<f32>) -> Result<(Vec<i64>, Vec<f32>), SegmentationError> {
        let mut session = self.session.lock().unwrap();
        if self.config.precision.is_half() {
            let half_input = input.mapv(f16::from_f32);
            let tensor = TensorRef::from_array_view(half_input.view())?;
            let outputs = session.run(ort::inputs![&*self.input_name => tensor])?;
            let (shape, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f16>()?;
            Ok((shape.to_vec(), data.iter().map(|v| v.to_f32()).collect()))
        } else {
            let tensor = TensorRef::from_array_view(input.view())?;
            let outputs = session.run(ort::inputs![&*self.input_name => tensor])?;
            let (shape, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
            Ok((shape.to_vec(), data.to_vec()))
        }
    }
}

/// Build the (1, 1, size, size) green-channel tensor the model expects
///
/// The image is resized with bilinear interpolation when it is not already
/// at the model resolution; green values are scaled by 1/255.
fn green_input_tensor(image: &RgbImage, size: u32) -> Array4<f32> {
    let resized = if image.dimensions() != (size, size) {
        image::imageops::resize(image, size, size, image::imageops::FilterType::Triangle)
    } else {
        image.clone()
    };

    let mut array = Array4::<f32>::zeros((1, 1, size as usize, size as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        array[[0, 0, y as usize, x as usize]] = f32::from(pixel[1]) / 255.0;
    }
    array
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Threshold raw logits into a 0/1 mask; a pixel is vessel only when its
/// sigmoid probability is strictly greater than `threshold`
fn mask_from_logits(logits: &[f32], width: usize, height: usize, threshold: f32) -> GrayImage {
    let mut mask = GrayImage::new(width as u32, height as u32);
    for (i, &logit) in logits.iter().enumerate() {
        let value = u8::from(sigmoid(logit) > threshold);
        let x = (i % width) as u32;
        let y = (i / width) as u32;
        mask.put_pixel(x, y, Luma([value]));
    }
    mask
}

/// Resize a binary mask to the original resolution
///
/// Nearest-neighbor keeps the value set at exactly {0, 1}.
fn restore_resolution(mask: &GrayImage, (width, height): (u32, u32)) -> GrayImage {
    image::imageops::resize(mask, width, height, image::imageops::FilterType::Nearest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([10, ((x * 40 + y * 7) % 256) as u8, 200])
        })
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_green_tensor_shape_and_values() {
        let img = gradient_image(4, 4);
        let tensor = green_input_tensor(&img, 4);
        assert_eq!(tensor.shape(), &[1, 1, 4, 4]);
        // No resize at native resolution, so values map straight through
        let expected = f32::from(img.get_pixel(2, 1)[1]) / 255.0;
        assert!((tensor[[0, 0, 1, 2]] - expected).abs() < 1e-6);
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_green_tensor_resizes_non_square_input() {
        let img = gradient_image(6, 3);
        let tensor = green_input_tensor(&img, 4);
        assert_eq!(tensor.shape(), &[1, 1, 4, 4]);
    }

    #[test]
    fn test_threshold_is_strict() {
        // logit 0.0 -> probability 0.5, which is NOT > 0.5
        let logits = vec![0.0, 5.0, -5.0, 0.1];
        let mask = mask_from_logits(&logits, 2, 2, 0.5);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(1, 0)[0], 1);
        assert_eq!(mask.get_pixel(0, 1)[0], 0);
        assert_eq!(mask.get_pixel(1, 1)[0], 1);
    }

    #[test]
    fn test_restore_resolution_stays_binary() {
        let mask = GrayImage::from_fn(4, 4, |x, y| Luma([u8::from((x + y) % 2 == 0)]));
        let restored = restore_resolution(&mask, (7, 5));
        assert_eq!(restored.dimensions(), (7, 5));
        assert!(restored.pixels().all(|p| p[0] == 0 || p[0] == 1));
    }

    #[test]
    fn test_mask_validation() {
        let good = GrayImage::from_fn(2, 2, |x, _| Luma([u8::from(x == 0)]));
        assert!(VesselMask::from_binary(good).is_ok());

        let bad = GrayImage::from_fn(2, 2, |_, _| Luma([255]));
        assert!(matches!(
            VesselMask::from_binary(bad),
            Err(SegmentationError::InvalidMaskValue(255))
        ));
    }

    #[test]
    fn test_mask_statistics() {
        let gray = GrayImage::from_fn(4, 2, |x, _| Luma([u8::from(x < 2)]));
        let mask = VesselMask::from_binary(gray).unwrap();
        assert_eq!(mask.vessel_pixel_count(), 4);
        assert!((mask.coverage() - 0.5).abs() < 1e-9);
        assert!(mask.is_vessel(0, 0));
        assert!(!mask.is_vessel(3, 1));
    }
}

//! End-to-end retinal screening pipeline
//!
//! Ties the per-model crates together: one call takes a decoded fundus
//! photograph through vessel segmentation, visualization rendering,
//! classifier preprocessing, and the grading cascade. The [`ModelRegistry`]
//! owns every session and is shared across requests; [`analyze`] is the
//! single-image entry point the serving layer calls.
//!
//! # Example
//! ```no_run
//! use retina_pipeline::{analyze, ModelRegistry, PipelineConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ModelRegistry::new(PipelineConfig::from_env())?;
//!
//! let image = image::open("fundus.png")?.to_rgb8();
//! let analysis = analyze(&registry, &image)?;
//!
//! println!(
//!     "{} (grade {}, confidence {:.3})",
//!     analysis.diagnosis.severity, analysis.diagnosis.grade, analysis.diagnosis.confidence
//! );
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod registry;

pub use config::{ModelPaths, PipelineConfig, DEFAULT_STAGE1_THRESHOLD};
pub use registry::ModelRegistry;
pub use retina_cascade_classification::Diagnosis;

use image::RgbImage;
use retina_cascade_classification::{preprocess_for_classification, run_cascade};
use retina_common::Result;
use retina_vessel_segmentation::overlay::{render_binary_map, render_vessel_overlay};
use std::time::Instant;
use tracing::{debug, info};

/// Everything the pipeline produces for one image
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    /// Original image with vessels tinted red
    pub overlay: RgbImage,
    /// Plain black/white vessel map
    pub binary_map: RgbImage,
    /// Structured grading result
    pub diagnosis: Diagnosis,
    /// Wall-clock seconds this image took
    pub processing_time: f64,
}

/// Run the full pipeline over one decoded image
///
/// Segments vessels, renders both visualizations, builds the classifier
/// tensor pair exactly once, and runs the cascade over it. Any failure is
/// reported for this image; the caller decides whether to continue with
/// other images.
///
/// # Errors
/// Returns error if segmentation, a model load, or a cascade stage fails
pub fn analyze(registry: &ModelRegistry, image: &RgbImage) -> Result<ImageAnalysis> {
    let start = Instant::now();
    let (width, height) = image.dimensions();
    debug!("analyzing {}x{} image", width, height);

    let mask = registry.vessel_segmenter().segment(image)?;
    let overlay = render_vessel_overlay(image, &mask)?;
    let binary_map = render_binary_map(&mask);

    let inputs = preprocess_for_classification(image, &mask);
    let diagnosis = run_cascade(registry, &inputs, registry.config().stage1_threshold)?;

    let processing_time = start.elapsed().as_secs_f64();
    info!(
        "Image analyzed in {:.3}s: {} (grade {})",
        processing_time, diagnosis.severity, diagnosis.grade
    );

    Ok(ImageAnalysis {
        overlay,
        binary_map,
        diagnosis,
        processing_time,
    })
}

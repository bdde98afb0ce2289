//! Diabetic retinopathy grading via a cascade of binary classifiers
//!
//! This crate implements the classification half of the screening pipeline:
//! a shared preprocessing step that turns a fundus photograph and its vessel
//! mask into the dual-stream tensor pair the classifiers consume, an ONNX
//! Runtime wrapper for the individual stage models, and the cascade
//! controller that chains up to three stages into a final grade.
//!
//! The cascade routes as follows: stage 1 screens for disease at all; when
//! disease probability clears the screening threshold, stage 2 splits early
//! from advanced disease, and stage 3a or 3b assigns the fine grade (1/2 or
//! 3/4). Stages that the routing never reaches are never scored, so their
//! models never need to be resident.
//!
//! # Example
//! ```no_run
//! use retina_cascade_classification::{
//!     preprocess_for_classification, run_cascade, ClassifierConfig, StageClassifier,
//! };
//! # use retina_cascade_classification::{ClassificationError, StageProvider, StageScorer};
//! # struct Models { s1: StageClassifier, s2: StageClassifier, s3a: StageClassifier, s3b: StageClassifier }
//! # impl StageProvider for Models {
//! #     fn stage1(&self) -> Result<&dyn StageScorer, ClassificationError> { Ok(&self.s1) }
//! #     fn stage2(&self) -> Result<&dyn StageScorer, ClassificationError> { Ok(&self.s2) }
//! #     fn stage3a(&self) -> Result<&dyn StageScorer, ClassificationError> { Ok(&self.s3a) }
//! #     fn stage3b(&self) -> Result<&dyn StageScorer, ClassificationError> { Ok(&self.s3b) }
//! # }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let image = image::RgbImage::new(1, 1);
//! # let mask = retina_vessel_segmentation::VesselMask::from_binary(image::GrayImage::new(1, 1))?;
//! let config = ClassifierConfig::default();
//! let models = Models {
//!     s1: StageClassifier::new("models/stage1.onnx", config)?,
//!     s2: StageClassifier::new("models/stage2.onnx", config)?,
//!     s3a: StageClassifier::new("models/stage3a.onnx", config)?,
//!     s3b: StageClassifier::new("models/stage3b.onnx", config)?,
//! };
//!
//! let inputs = preprocess_for_classification(&image, &mask);
//! let diagnosis = run_cascade(&models, &inputs, 0.35)?;
//! println!("{} (grade {})", diagnosis.severity, diagnosis.grade);
//! # Ok(())
//! # }
//! ```

pub mod cascade;
pub mod classifier;
pub mod preprocess;

pub use cascade::{run_cascade, CascadeStage, Diagnosis, StageProvider};
pub use classifier::{ClassificationError, ClassifierConfig, StageClassifier, StageOutput, StageScorer};
pub use preprocess::{preprocess_for_classification, ClassifierInputs, CLASSIFIER_INPUT_SIZE};

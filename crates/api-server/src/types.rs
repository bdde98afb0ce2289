//! API request and response types

use retina_pipeline::Diagnosis;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Whether the screening-critical models are resident in memory
    pub models_loaded: bool,
    /// Compute device the models run on
    pub device: String,
}

/// Outcome for a single uploaded image
///
/// A batch keeps going when one image fails, so every upload produces
/// either a full result or an error record under the same `image_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageResult {
    /// Image was decoded, segmented, and graded
    Success(ImageSuccess),
    /// Image could not be processed
    Error(ImageFailure),
}

/// Per-image prediction payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSuccess {
    /// File name of the upload
    pub image_id: String,
    /// Original image re-encoded as a base64 PNG
    pub original_image: String,
    /// Vessel overlay visualization as a base64 PNG
    pub vessel_map: String,
    /// Black-and-white vessel map as a base64 PNG
    pub binary_vessel_map: String,
    /// Structured grading result from the classifier cascade
    pub classification: Diagnosis,
    /// Seconds spent segmenting and grading this image
    pub processing_time: f64,
}

/// Per-image failure record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFailure {
    /// File name of the upload
    pub image_id: String,
    /// What went wrong with this image
    pub error: String,
}

/// Batch prediction response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Whether the request as a whole was accepted
    pub success: bool,
    /// Per-image outcomes in upload order
    pub results: Vec<ImageResult>,
    /// Seconds spent on the entire batch
    pub total_processing_time: f64,
    /// Number of uploads processed
    pub num_images: usize,
}

/// Error envelope for requests rejected as a whole
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,
    /// Why the request was rejected
    pub error: String,
}

impl ErrorResponse {
    /// Create an error response with the given message
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

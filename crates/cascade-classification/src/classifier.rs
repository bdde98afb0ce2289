//! ONNX Runtime wrapper for the individual cascade stage models
//!
//! Each stage is a dual-stream binary classifier: two named inputs (vessel
//! mask stream, green channel stream) and a `[1, 2]` main-logits output.
//! The exported graphs also carry auxiliary heads (attention maps, fused
//! features); only the main logits are read here.

use half::f16;
use ndarray::Array4;
use ort::{session::Session, value::TensorRef};
use retina_common::onnx::{create_optimized_session, OnnxError};
use retina_common::{Device, Precision, ProcessingError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::preprocess::ClassifierInputs;

/// Configuration shared by every stage classifier
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Compute device preference
    pub device: Device,
    /// Model weight precision; `Half` casts inputs to f16
    pub precision: Precision,
}

/// Errors that can occur while loading or scoring a cascade stage
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("ONNX Runtime error: {0}")]
    OrtError(#[from] ort::Error),

    #[error("Model load error: {0}")]
    ModelLoad(#[from] OnnxError),

    #[error("Model contract violation: {0}")]
    ModelContract(String),

    #[error("Invalid model output shape: expected [1, 2], got {0:?}")]
    InvalidOutputShape(Vec<i64>),
}

impl From<ClassificationError> for ProcessingError {
    fn from(err: ClassificationError) -> Self {
        match err {
            ClassificationError::ModelLoad(e) => ProcessingError::Model(e.to_string()),
            other => ProcessingError::Inference(other.to_string()),
        }
    }
}

/// Softmax probabilities a stage emits for its two classes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    pub probabilities: [f32; 2],
}

impl StageOutput {
    /// Index of the winning class; ties resolve to the lower index
    #[must_use]
    pub fn argmax(&self) -> usize {
        usize::from(self.probabilities[1] > self.probabilities[0])
    }

    /// Probability of the winning class
    #[must_use]
    pub fn confidence(&self) -> f32 {
        self.probabilities[self.argmax()]
    }
}

/// Scoring interface a cascade stage exposes
///
/// Implemented by [`StageClassifier`] for real models and by canned scorers
/// in tests.
pub trait StageScorer {
    /// Score the tensor pair, returning softmax probabilities over the
    /// stage's two classes
    fn score(&self, inputs: &ClassifierInputs) -> Result<StageOutput, ClassificationError>;
}

/// A single cascade stage backed by an ONNX session
///
/// The session sits behind a mutex so one classifier can be shared across
/// request handlers; concurrent scores serialize on the session.
pub struct StageClassifier {
    session: Mutex<Session>,
    precision: Precision,
    vessel_input: String,
    green_input: String,
    output_name: String,
}

impl StageClassifier {
    /// Load a stage model
    ///
    /// Input names are resolved positionally from the graph: input 0 is the
    /// vessel stream, input 1 the green stream. The first output is the
    /// main-logits head.
    ///
    /// # Arguments
    /// * `model_path` - Path to the stage ONNX model
    /// * `config` - Device and precision settings
    ///
    /// # Errors
    /// Returns error if model loading fails or the graph does not have the
    /// expected inputs/outputs
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        config: ClassifierConfig,
    ) -> Result<Self, ClassificationError> {
        let model_path = model_path.as_ref();
        info!("Loading stage classifier from {:?}", model_path);

        let session = create_optimized_session(model_path, config.device)?;

        if session.inputs.len() < 2 {
            return Err(ClassificationError::ModelContract(format!(
                "expected two inputs (vessel, green), model has {}",
                session.inputs.len()
            )));
        }
        let vessel_input = session.inputs[0].name.clone();
        let green_input = session.inputs[1].name.clone();
        let output_name = session
            .outputs
            .first()
            .ok_or_else(|| ClassificationError::ModelContract("model has no outputs".to_string()))?
            .name
            .clone();

        debug!(
            "Stage classifier loaded (inputs: {}, {}; output: {})",
            vessel_input, green_input, output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            precision: config.precision,
            vessel_input,
            green_input,
            output_name,
        })
    }

    fn run(&self, inputs: &ClassifierInputs) -> Result<StageOutput, ClassificationError> {
        let (shape, logits) = self.run_session(&inputs.vessel, &inputs.green)?;

        if shape != [1, 2] {
            return Err(ClassificationError::InvalidOutputShape(shape));
        }

        Ok(StageOutput {
            probabilities: softmax2([logits[0], logits[1]]),
        })
    }

    fn run_session(
        &self,
        vessel: &Array4<f32>,
        green: &Array4<f32>,
    ) -> Result<(Vec<i64>, Vec<f32>), ClassificationError> {
        let mut session = self.session.lock().unwrap();
        if self.precision.is_half() {
            let vessel = vessel.mapv(f16::from_f32);
            let green = green.mapv(f16::from_f32);
            let vessel_tensor = TensorRef::from_array_view(vessel.view())?;
            let green_tensor = TensorRef::from_array_view(green.view())?;
            let outputs = session.run(ort::inputs![
                &*self.vessel_input => vessel_tensor,
                &*self.green_input => green_tensor
            ])?;
            let (shape, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f16>()?;
            Ok((shape.to_vec(), data.iter().map(|v| v.to_f32()).collect()))
        } else {
            let vessel_tensor = TensorRef::from_array_view(vessel.view())?;
            let green_tensor = TensorRef::from_array_view(green.view())?;
            let outputs = session.run(ort::inputs![
                &*self.vessel_input => vessel_tensor,
                &*self.green_input => green_tensor
            ])?;
            let (shape, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
            Ok((shape.to_vec(), data.to_vec()))
        }
    }
}

impl StageScorer for StageClassifier {
    fn score(&self, inputs: &ClassifierInputs) -> Result<StageOutput, ClassificationError> {
        self.run(inputs)
    }
}

/// Numerically stable softmax over the two stage logits
fn softmax2(logits: [f32; 2]) -> [f32; 2] {
    let max_logit = logits[0].max(logits[1]);
    let exp0 = (logits[0] - max_logit).exp();
    let exp1 = (logits[1] - max_logit).exp();
    let sum = exp0 + exp1;
    [exp0 / sum, exp1 / sum]
}

//! Common types and utilities for the retinal screening pipeline

pub mod onnx;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Processing errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<image::ImageError> for ProcessingError {
    fn from(err: image::ImageError) -> Self {
        ProcessingError::ImageError(err.to_string())
    }
}

impl From<onnx::OnnxError> for ProcessingError {
    fn from(err: onnx::OnnxError) -> Self {
        ProcessingError::Model(err.to_string())
    }
}

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Compute device preference for model execution
///
/// `Cuda` requests the CUDA execution provider with CPU fallback; `Cpu`
/// pins execution to CPU only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cuda,
    Cpu,
}

impl Device {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cuda" | "gpu" => Ok(Device::Cuda),
            "cpu" => Ok(Device::Cpu),
            other => Err(ProcessingError::InvalidInput(format!(
                "unknown device: {other}"
            ))),
        }
    }
}

/// Numeric precision of the exported model weights
///
/// `Half` expects fp16 exports and casts input tensors to f16 before each
/// run; `Full` keeps everything in f32. Applied uniformly to every model in
/// a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Full,
    Half,
}

impl Precision {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Full => "full",
            Precision::Half => "half",
        }
    }

    #[must_use]
    pub fn is_half(&self) -> bool {
        matches!(self, Precision::Half)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Precision {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "full" | "fp32" | "float32" => Ok(Precision::Full),
            "half" | "fp16" | "float16" => Ok(Precision::Half),
            other => Err(ProcessingError::InvalidInput(format!(
                "unknown precision: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_parse_and_display() {
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda);
        assert_eq!("GPU".parse::<Device>().unwrap(), Device::Cuda);
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert!("tpu".parse::<Device>().is_err());
        assert_eq!(Device::Cuda.to_string(), "cuda");
        assert_eq!(Device::default(), Device::Cuda);
    }

    #[test]
    fn test_precision_parse_and_display() {
        assert_eq!("full".parse::<Precision>().unwrap(), Precision::Full);
        assert_eq!("fp16".parse::<Precision>().unwrap(), Precision::Half);
        assert!(!Precision::Full.is_half());
        assert!(Precision::Half.is_half());
        assert_eq!(Precision::default(), Precision::Full);
    }

    #[test]
    fn test_device_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Device::Cuda).unwrap(), "\"cuda\"");
        assert_eq!(
            serde_json::from_str::<Precision>("\"half\"").unwrap(),
            Precision::Half
        );
    }

    #[test]
    fn test_error_conversions() {
        let err = ProcessingError::from(onnx::OnnxError::ModelNotFound("m.onnx".to_string()));
        assert!(matches!(err, ProcessingError::Model(_)));
        assert_eq!(err.to_string(), "Model error: Model file not found: m.onnx");
    }
}

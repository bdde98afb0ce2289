//! Pipeline configuration
//!
//! Everything is settable from the environment so deployments can relocate
//! models or flip device/precision without a rebuild:
//!
//! - `RETINA_MODELS_DIR` - directory holding the five ONNX exports
//! - `RETINA_VESSEL_MODEL`, `RETINA_STAGE1_MODEL`, `RETINA_STAGE2_MODEL`,
//!   `RETINA_STAGE3A_MODEL`, `RETINA_STAGE3B_MODEL` - per-model overrides
//! - `RETINA_DEVICE` - `cuda` (default, with CPU fallback) or `cpu`
//! - `RETINA_PRECISION` - `full` (default) or `half`
//! - `RETINA_STAGE1_THRESHOLD` - screening threshold, default 0.35

use retina_common::{Device, Precision};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Default screening threshold for the stage 1 classifier
pub const DEFAULT_STAGE1_THRESHOLD: f32 = 0.35;

/// File-system locations of the five ONNX models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPaths {
    pub vessel: PathBuf,
    pub stage1: PathBuf,
    pub stage2: PathBuf,
    pub stage3a: PathBuf,
    pub stage3b: PathBuf,
}

impl ModelPaths {
    /// All five models under one directory with the default file names
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            vessel: dir.join("vessel_segmentation.onnx"),
            stage1: dir.join("stage1.onnx"),
            stage2: dir.join("stage2.onnx"),
            stage3a: dir.join("stage3a.onnx"),
            stage3b: dir.join("stage3b.onnx"),
        }
    }
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self::from_dir("models")
    }
}

/// Configuration for the full screening pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub model_paths: ModelPaths,
    /// Compute device for every model
    pub device: Device,
    /// Weight precision for every model
    pub precision: Precision,
    /// Stage 1 screening threshold; disease when `P(disease) >= threshold`
    pub stage1_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_paths: ModelPaths::default(),
            device: Device::default(),
            precision: Precision::default(),
            stage1_threshold: DEFAULT_STAGE1_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Build a configuration from `RETINA_*` environment variables
    ///
    /// Unset variables fall back to defaults; unparseable values are logged
    /// and ignored rather than refusing to start.
    #[must_use]
    pub fn from_env() -> Self {
        let mut model_paths = match std::env::var("RETINA_MODELS_DIR") {
            Ok(dir) => ModelPaths::from_dir(dir),
            Err(_) => ModelPaths::default(),
        };
        for (var, slot) in [
            ("RETINA_VESSEL_MODEL", &mut model_paths.vessel),
            ("RETINA_STAGE1_MODEL", &mut model_paths.stage1),
            ("RETINA_STAGE2_MODEL", &mut model_paths.stage2),
            ("RETINA_STAGE3A_MODEL", &mut model_paths.stage3a),
            ("RETINA_STAGE3B_MODEL", &mut model_paths.stage3b),
        ] {
            if let Ok(path) = std::env::var(var) {
                *slot = PathBuf::from(path);
            }
        }

        Self {
            model_paths,
            device: env_parse("RETINA_DEVICE", Device::default()),
            precision: env_parse("RETINA_PRECISION", Precision::default()),
            stage1_threshold: env_parse("RETINA_STAGE1_THRESHOLD", DEFAULT_STAGE1_THRESHOLD),
        }
    }
}

fn env_parse<T: FromStr>(var: &str, default: T) -> T {
    match std::env::var(var) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("ignoring unparseable {}={:?}", var, raw);
                default
            }
        },
        Err(_) => default,
    }
}

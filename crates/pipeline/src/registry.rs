//! Process-wide model registry
//!
//! Owns the five model sessions with the residency policy the cascade
//! implies: the vessel segmenter and stage 1 screen every image, so they
//! load eagerly at construction and a failure there is fatal. Stages 2, 3a
//! and 3b only run for images routed to them, so they load on first demand.
//! A failed lazy load is reported for the triggering image and retried on
//! the next request rather than being cached.

use once_cell::sync::OnceCell;
use retina_cascade_classification::{
    ClassificationError, ClassifierConfig, StageClassifier, StageProvider, StageScorer,
};
use retina_common::Result;
use retina_vessel_segmentation::{SegmentationConfig, VesselSegmenter};
use tracing::info;

use crate::config::PipelineConfig;

/// Registry of every model session in the pipeline
///
/// Built once at startup and shared behind an `Arc`; all interior state is
/// synchronized, so handlers can call into it concurrently.
pub struct ModelRegistry {
    config: PipelineConfig,
    vessel: VesselSegmenter,
    stage1: StageClassifier,
    stage2: OnceCell<StageClassifier>,
    stage3a: OnceCell<StageClassifier>,
    stage3b: OnceCell<StageClassifier>,
}

impl ModelRegistry {
    /// Load the screening-critical models and prepare the lazy slots
    ///
    /// # Errors
    /// Returns error when the vessel or stage 1 model cannot be loaded;
    /// the process should treat that as fatal.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        info!(
            "Initializing model registry (device: {}, precision: {})",
            config.device, config.precision
        );

        let segmentation_config = SegmentationConfig {
            device: config.device,
            precision: config.precision,
            ..SegmentationConfig::default()
        };
        let vessel = VesselSegmenter::new(&config.model_paths.vessel, segmentation_config)?;
        let stage1 = StageClassifier::new(
            &config.model_paths.stage1,
            ClassifierConfig {
                device: config.device,
                precision: config.precision,
            },
        )?;

        info!("vessel and stage 1 models loaded");

        Ok(Self {
            config,
            vessel,
            stage1,
            stage2: OnceCell::new(),
            stage3a: OnceCell::new(),
            stage3b: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn vessel_segmenter(&self) -> &VesselSegmenter {
        &self.vessel
    }

    /// Whether the screening-critical models are resident
    ///
    /// Construction loads them eagerly, so this holds for any live
    /// registry; the health endpoint reports it.
    #[must_use]
    pub fn models_loaded(&self) -> bool {
        true
    }

    fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            device: self.config.device,
            precision: self.config.precision,
        }
    }
}

impl StageProvider for ModelRegistry {
    fn stage1(&self) -> std::result::Result<&dyn StageScorer, ClassificationError> {
        Ok(&self.stage1)
    }

    fn stage2(&self) -> std::result::Result<&dyn StageScorer, ClassificationError> {
        self.stage2
            .get_or_try_init(|| {
                info!("loading stage 2 model on first demand");
                StageClassifier::new(&self.config.model_paths.stage2, self.classifier_config())
            })
            .map(|classifier| classifier as &dyn StageScorer)
    }

    fn stage3a(&self) -> std::result::Result<&dyn StageScorer, ClassificationError> {
        self.stage3a
            .get_or_try_init(|| {
                info!("loading stage 3a model on first demand");
                StageClassifier::new(&self.config.model_paths.stage3a, self.classifier_config())
            })
            .map(|classifier| classifier as &dyn StageScorer)
    }

    fn stage3b(&self) -> std::result::Result<&dyn StageScorer, ClassificationError> {
        self.stage3b
            .get_or_try_init(|| {
                info!("loading stage 3b model on first demand");
                StageClassifier::new(&self.config.model_paths.stage3b, self.classifier_config())
            })
            .map(|classifier| classifier as &dyn StageScorer)
    }
}

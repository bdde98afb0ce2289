//! Cascade controller: routes an image through up to three classifier stages
//!
//! Stage 1 screens for any disease; its positive class probability is
//! compared against the screening threshold (inclusive, so a probability
//! exactly at the threshold counts as disease). Stage 2 splits early from
//! advanced disease, and stage 3a/3b assigns the final grade. Later stages
//! are requested from the [`StageProvider`] only when the routing actually
//! reaches them.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{ClassificationError, StageScorer};
use crate::preprocess::ClassifierInputs;

/// Position in the cascade state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStage {
    Stage1,
    Stage2,
    Stage3A,
    Stage3B,
    Done,
}

/// Hands out stage scorers on demand
///
/// The model registry implements this with lazily loaded sessions; a failed
/// load surfaces as the error of the image being processed and is retried
/// on the next request.
pub trait StageProvider {
    fn stage1(&self) -> Result<&dyn StageScorer, ClassificationError>;
    fn stage2(&self) -> Result<&dyn StageScorer, ClassificationError>;
    fn stage3a(&self) -> Result<&dyn StageScorer, ClassificationError>;
    fn stage3b(&self) -> Result<&dyn StageScorer, ClassificationError>;
}

/// Structured grading result built up as the cascade advances
///
/// Field values mirror the serving contract: `severity` is `"No DR"` or
/// `"Grade 1"`..`"Grade 4"`, `stage2_result` is the coarse split
/// (`"Early DR"`/`"Advanced DR"`), and `stage3_result` repeats the final
/// grade label. Stages the routing never reached stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub has_dr: bool,
    pub severity: String,
    pub grade: u8,
    pub confidence: f32,
    pub stage1_result: String,
    pub stage2_result: Option<String>,
    pub stage3_result: Option<String>,
}

impl Diagnosis {
    /// Baseline record the cascade refines: no disease, grade 0
    fn baseline() -> Self {
        Self {
            has_dr: false,
            severity: "No DR".to_string(),
            grade: 0,
            confidence: 0.0,
            stage1_result: String::new(),
            stage2_result: None,
            stage3_result: None,
        }
    }

    fn apply_grade(&mut self, grade: u8, confidence: f32) {
        self.grade = grade;
        self.severity = format!("Grade {grade}");
        self.stage3_result = Some(format!("Grade {grade}"));
        self.confidence = confidence;
    }
}

/// Run the classification cascade over a preprocessed tensor pair
///
/// The same `inputs` feed every stage; nothing is recomputed between
/// stages. Scorer and model-load errors propagate unchanged so the caller
/// can record them against the image being processed.
///
/// # Arguments
/// * `provider` - Source of stage scorers (registry in production, canned
///   scorers in tests)
/// * `inputs` - Preprocessed tensor pair
/// * `stage1_threshold` - Screening threshold; disease when
///   `P(disease) >= threshold`
///
/// # Errors
/// Returns error if any visited stage fails to load or score
pub fn run_cascade<P: StageProvider + ?Sized>(
    provider: &P,
    inputs: &ClassifierInputs,
    stage1_threshold: f32,
) -> Result<Diagnosis, ClassificationError> {
    let mut stage = CascadeStage::Stage1;
    let mut diagnosis = Diagnosis::baseline();

    loop {
        stage = match stage {
            CascadeStage::Stage1 => {
                let output = provider.stage1()?.score(inputs)?;
                let prob_no_dr = output.probabilities[0];
                let prob_dr = output.probabilities[1];
                debug!(
                    "stage1: P(no DR)={:.3}, P(DR)={:.3}, threshold={:.3}",
                    prob_no_dr, prob_dr, stage1_threshold
                );

                if prob_dr >= stage1_threshold {
                    diagnosis.has_dr = true;
                    diagnosis.stage1_result = "DR (Ensemble)".to_string();
                    CascadeStage::Stage2
                } else {
                    diagnosis.confidence = prob_no_dr;
                    diagnosis.stage1_result = format!("No DR (P(DR)={prob_dr:.3})");
                    CascadeStage::Done
                }
            }
            CascadeStage::Stage2 => {
                let output = provider.stage2()?.score(inputs)?;
                debug!("stage2: probabilities={:?}", output.probabilities);

                if output.argmax() == 0 {
                    diagnosis.stage2_result = Some("Early DR".to_string());
                    CascadeStage::Stage3A
                } else {
                    diagnosis.stage2_result = Some("Advanced DR".to_string());
                    CascadeStage::Stage3B
                }
            }
            CascadeStage::Stage3A => {
                let output = provider.stage3a()?.score(inputs)?;
                debug!("stage3a: probabilities={:?}", output.probabilities);

                let grade = if output.argmax() == 0 { 1 } else { 2 };
                diagnosis.apply_grade(grade, output.confidence());
                CascadeStage::Done
            }
            CascadeStage::Stage3B => {
                let output = provider.stage3b()?.score(inputs)?;
                debug!("stage3b: probabilities={:?}", output.probabilities);

                let grade = if output.argmax() == 0 { 3 } else { 4 };
                diagnosis.apply_grade(grade, output.confidence());
                CascadeStage::Done
            }
            CascadeStage::Done => break,
        };
    }

    Ok(diagnosis)
}

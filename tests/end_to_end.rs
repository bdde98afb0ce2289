//! End-to-end pipeline tests against the real ONNX models
//!
//! These run the actual sessions, so every test skips itself when the
//! model files are not present. Point `RETINA_MODELS_DIR` at the model
//! directory to run them.

mod common;

use common::{assert_diagnosis_coherent, synthetic_fundus};
use retina_pipeline::{analyze, ModelRegistry, PipelineConfig};

fn try_load_registry() -> Option<ModelRegistry> {
    let config = PipelineConfig::from_env();
    if !config.model_paths.vessel.exists() || !config.model_paths.stage1.exists() {
        eprintln!(
            "Models not found at {:?} / {:?}",
            config.model_paths.vessel, config.model_paths.stage1
        );
        return None;
    }

    match ModelRegistry::new(config) {
        Ok(registry) => Some(registry),
        Err(e) => {
            eprintln!("Failed to load models: {e}");
            None
        }
    }
}

#[test]
fn test_analyze_keeps_original_resolution() {
    let Some(registry) = try_load_registry() else {
        eprintln!("Skipping test_analyze_keeps_original_resolution");
        return;
    };

    // Non-square input exercises both resize paths
    let image = synthetic_fundus(600, 400);
    let analysis = analyze(&registry, &image).expect("Analysis failed");

    assert_eq!(analysis.overlay.dimensions(), (600, 400));
    assert_eq!(analysis.binary_map.dimensions(), (600, 400));
    assert!(analysis.processing_time > 0.0);
    assert_diagnosis_coherent(&analysis.diagnosis);
}

#[test]
fn test_analyze_is_deterministic() {
    let Some(registry) = try_load_registry() else {
        eprintln!("Skipping test_analyze_is_deterministic");
        return;
    };

    let image = synthetic_fundus(512, 512);
    let first = analyze(&registry, &image).expect("First analysis failed");
    let second = analyze(&registry, &image).expect("Second analysis failed");

    assert_eq!(first.diagnosis, second.diagnosis);
    assert_eq!(first.overlay, second.overlay);
    assert_eq!(first.binary_map, second.binary_map);
}

#[test]
fn test_segmenter_emits_binary_mask_at_input_resolution() {
    let Some(registry) = try_load_registry() else {
        eprintln!("Skipping test_segmenter_emits_binary_mask_at_input_resolution");
        return;
    };

    let image = synthetic_fundus(512, 512);
    let mask = registry
        .vessel_segmenter()
        .segment(&image)
        .expect("Segmentation failed");

    assert_eq!(mask.dimensions(), (512, 512));
    for pixel in mask.as_gray().pixels() {
        assert!(pixel[0] <= 1, "mask value not binary: {}", pixel[0]);
    }
    assert!((0.0..=1.0).contains(&mask.coverage()));
}

#[test]
fn test_overlay_only_reddens_vessel_pixels() {
    let Some(registry) = try_load_registry() else {
        eprintln!("Skipping test_overlay_only_reddens_vessel_pixels");
        return;
    };

    let image = synthetic_fundus(512, 512);
    let analysis = analyze(&registry, &image).expect("Analysis failed");

    for (x, y, pixel) in analysis.overlay.enumerate_pixels() {
        let original = image.get_pixel(x, y);
        assert_eq!(pixel[1], original[1]);
        assert_eq!(pixel[2], original[2]);
        assert!(pixel[0] >= original[0]);
    }
}

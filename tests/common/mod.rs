//! Shared helpers for the workspace integration suites

#![allow(dead_code)]

use image::{GrayImage, Rgb, RgbImage};
use retina_pipeline::Diagnosis;

/// Synthetic fundus-like photograph: a warm disc on a black background
/// with a brighter patch standing in for the optic disc
pub fn synthetic_fundus(width: u32, height: u32) -> RgbImage {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let radius = cx.min(cy) * 0.95;

    RgbImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let distance = (dx * dx + dy * dy).sqrt();

        if distance > radius {
            Rgb([0, 0, 0])
        } else if distance < radius * 0.15 {
            Rgb([230, 180, 110])
        } else {
            let falloff = 1.0 - distance / radius;
            Rgb([
                (120.0 + 60.0 * falloff) as u8,
                (50.0 + 40.0 * falloff) as u8,
                (25.0 + 15.0 * falloff) as u8,
            ])
        }
    })
}

/// Binary mask with a diagonal band of vessel pixels set to 1
pub fn striped_mask(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        image::Luma([u8::from((x + y) % 7 == 0)])
    })
}

/// Assert the cross-field consistency every diagnosis must satisfy
pub fn assert_diagnosis_coherent(diagnosis: &Diagnosis) {
    assert!(diagnosis.grade <= 4, "grade out of range: {}", diagnosis.grade);
    assert!(
        (0.0..=1.0).contains(&diagnosis.confidence),
        "confidence out of range: {}",
        diagnosis.confidence
    );

    if diagnosis.has_dr {
        assert!(diagnosis.grade >= 1);
        assert_eq!(diagnosis.severity, format!("Grade {}", diagnosis.grade));
        assert_eq!(diagnosis.stage1_result, "DR (Ensemble)");
        assert_eq!(
            diagnosis.stage3_result.as_deref(),
            Some(diagnosis.severity.as_str())
        );
        match diagnosis.stage2_result.as_deref() {
            Some("Early DR") => assert!(diagnosis.grade <= 2),
            Some("Advanced DR") => assert!(diagnosis.grade >= 3),
            other => panic!("unexpected stage2_result: {other:?}"),
        }
    } else {
        assert_eq!(diagnosis.severity, "No DR");
        assert_eq!(diagnosis.grade, 0);
        assert!(
            diagnosis.stage1_result.starts_with("No DR (P(DR)="),
            "unexpected stage1_result: {}",
            diagnosis.stage1_result
        );
        assert_eq!(diagnosis.stage2_result, None);
        assert_eq!(diagnosis.stage3_result, None);
    }
}

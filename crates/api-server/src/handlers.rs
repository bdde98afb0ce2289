//! HTTP request handlers for API endpoints

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use image::RgbImage;
use std::io::Cursor;
use std::time::Instant;
use tracing::{info, warn};

use crate::types::{
    ErrorResponse, HealthResponse, ImageFailure, ImageResult, ImageSuccess, PredictResponse,
};
use crate::ApiState;

/// Multipart field name carrying the uploaded images
const IMAGES_FIELD: &str = "images";

/// Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        models_loaded: state.registry.models_loaded(),
        device: state.registry.config().device.to_string(),
    })
}

/// Batch prediction endpoint
///
/// Accepts one or more fundus images in multipart fields named `images`.
/// Each image is decoded, segmented, and graded independently; a failure
/// on one image is recorded in its slot and the batch continues. Only a
/// request carrying no images at all is rejected.
pub async fn predict(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, (StatusCode, Json<ErrorResponse>)> {
    let batch_start = Instant::now();
    let mut results = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Malformed multipart request: {e}")))?
    {
        if field.name() != Some(IMAGES_FIELD) {
            continue;
        }

        let image_id = field.file_name().unwrap_or("unknown").to_string();
        match field.bytes().await {
            Ok(bytes) => results.push(process_image(&state, image_id, &bytes)),
            Err(e) => {
                warn!("Failed to read upload {}: {}", image_id, e);
                results.push(ImageResult::Error(ImageFailure {
                    image_id,
                    error: format!("Failed to read upload: {e}"),
                }));
            }
        }
    }

    if results.is_empty() {
        return Err(bad_request("No images provided".to_string()));
    }

    let total_processing_time = batch_start.elapsed().as_secs_f64();
    let num_images = results.len();
    info!(
        "Processed {} image(s) in {:.3}s",
        num_images, total_processing_time
    );

    Ok(Json(PredictResponse {
        success: true,
        results,
        total_processing_time,
        num_images,
    }))
}

fn bad_request(error: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(error)))
}

/// Run one upload through the full pipeline, folding any failure into a
/// per-image error record
fn process_image(state: &ApiState, image_id: String, bytes: &[u8]) -> ImageResult {
    match analyze_upload(state, &image_id, bytes) {
        Ok(success) => ImageResult::Success(success),
        Err(error) => {
            warn!("Image {} failed: {}", image_id, error);
            ImageResult::Error(ImageFailure { image_id, error })
        }
    }
}

fn analyze_upload(state: &ApiState, image_id: &str, bytes: &[u8]) -> Result<ImageSuccess, String> {
    let image = image::load_from_memory(bytes)
        .map_err(|_| "Failed to decode image".to_string())?
        .to_rgb8();

    let analysis = retina_pipeline::analyze(&state.registry, &image).map_err(|e| e.to_string())?;

    Ok(ImageSuccess {
        image_id: image_id.to_string(),
        original_image: encode_png_base64(&image).map_err(|e| e.to_string())?,
        vessel_map: encode_png_base64(&analysis.overlay).map_err(|e| e.to_string())?,
        binary_vessel_map: encode_png_base64(&analysis.binary_map).map_err(|e| e.to_string())?,
        classification: analysis.diagnosis,
        processing_time: analysis.processing_time,
    })
}

/// Re-encode an image as PNG and wrap it in standard base64
fn encode_png_base64(image: &RgbImage) -> Result<String, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(general_purpose::STANDARD.encode(buffer.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_png_base64_roundtrip() {
        let image = RgbImage::from_pixel(4, 4, image::Rgb([120, 80, 40]));

        let encoded = encode_png_base64(&image).unwrap();
        let bytes = general_purpose::STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();

        assert_eq!(decoded.dimensions(), (4, 4));
        assert_eq!(decoded.get_pixel(2, 2), &image::Rgb([120, 80, 40]));
    }

    #[test]
    fn test_png_signature() {
        let image = RgbImage::new(2, 2);

        let encoded = encode_png_base64(&image).unwrap();
        let bytes = general_purpose::STANDARD.decode(encoded).unwrap();

        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}

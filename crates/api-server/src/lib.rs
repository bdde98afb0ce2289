//! REST API server for the retinal screening pipeline
//!
//! Exposes the segmentation and grading pipeline over HTTP:
//! - `GET /api/health` reports service status and model residency
//! - `POST /api/predict` accepts multipart image uploads and returns a
//!   per-image diagnosis plus base64 PNG visualizations
//!
//! # Example
//!
//! ```no_run
//! use retina_api_server::{build_router, ApiState};
//! use retina_pipeline::{ModelRegistry, PipelineConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(ModelRegistry::new(PipelineConfig::from_env())?);
//! let app = build_router(ApiState::new(registry));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod handlers;
pub mod types;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use retina_pipeline::ModelRegistry;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::{health_check, predict};
pub use types::{
    ErrorResponse, HealthResponse, ImageFailure, ImageResult, ImageSuccess, PredictResponse,
};

/// Maximum accepted request body size in bytes
///
/// Fundus scans are large and the predict endpoint takes whole batches,
/// so the cap sits well above the axum default.
pub const MAX_BODY_BYTES: usize = 200 * 1024 * 1024;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Model registry running the screening pipeline
    pub registry: Arc<ModelRegistry>,
}

impl ApiState {
    /// Create API state around a loaded registry
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(health_check))
        // Batch prediction
        .route("/api/predict", post(predict))
        // Middleware
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
///
/// Binds to the given address and serves until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}

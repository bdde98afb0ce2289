//! API server binary entry point

use retina_api_server::{start_server, ApiState};
use retina_pipeline::{ModelRegistry, PipelineConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "retina_api_server=info,retina_pipeline=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("RETINA_API_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    // The registry loads the vessel and stage 1 models up front; the
    // server refuses to start if either is missing.
    let config = PipelineConfig::from_env();
    let registry = Arc::new(ModelRegistry::new(config)?);

    start_server(&addr, ApiState::new(registry)).await?;

    Ok(())
}

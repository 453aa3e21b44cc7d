#[cfg(not(any(all(target_os = "macos", target_arch = "aarch64"), target_os = "ios")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use dotenv::dotenv;
use retina_api::{construct_router, state::State};
use retina_inference::{ClassifierService, InferenceConfig};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    tracing::info!("Starting retinal classifier API");

    let config = config::Config::from_env()?;
    tracing::info!(
        "Loaded configuration: port={}, model={}, labels={}",
        config.port,
        config.inference.model_path.display(),
        config.inference.labels_path.display()
    );

    let classifier = load_classifier(config.inference.clone()).await;
    let state = State::new(classifier).with_max_upload_bytes(config.max_upload_bytes);
    let app = construct_router(Arc::new(state));

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Load the model off the async runtime. Failures leave the server running without a model.
async fn load_classifier(config: InferenceConfig) -> Option<ClassifierService> {
    let result = tokio::task::spawn_blocking(move || ClassifierService::load(&config)).await;

    match result {
        Ok(Ok(service)) => Some(service),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to load model, /predict will answer 503");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "Model loading task panicked");
            None
        }
    }
}

mod config;
mod error;
mod handlers;
mod models;
mod server;
mod services;

use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;

use config::Config;
use handlers::PredictionHandler;
use server::create_router;
use services::{ClassifierEngine, Database, NutritionRepository, OnnxModel};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables first so RUST_LOG from .env applies
    dotenv().ok();

    // Initialize logger
    env_logger::init();

    log::info!("🚀 Starting Vegetable Nutrition API...");

    let config = Config::from_env()?;

    // The model is loaded once and shared read-only by every request
    let model = OnnxModel::load(&config.model_path, config.model_sha256.as_deref())?;
    log::info!(
        "✅ Model loaded from {} (sha256 {})",
        config.model_path.display(),
        model.fingerprint()
    );
    let classifier = Arc::new(ClassifierEngine::new(Arc::new(model)));

    let db = Database::new(
        &config.database_url,
        config.database_max_connections,
        &config.nutrition_table,
    )
    .await
    .context("failed to connect to the nutrition database")?;
    let repository: Arc<dyn NutritionRepository> = Arc::new(db);
    log::info!(
        "✅ PostgreSQL pool ready (table \"{}\", max {} connections)",
        config.nutrition_table,
        config.database_max_connections
    );

    let prediction_handler = Arc::new(PredictionHandler::new(classifier, repository));
    let app = create_router(prediction_handler, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    log::info!("🌐 Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("🛑 Shutting down...");
        })
        .await?;

    Ok(())
}

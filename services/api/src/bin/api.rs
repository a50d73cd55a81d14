//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        CannedResearchAdapter, DbAdapter, MemoryStore, OpenAiResearchAdapter, RazorpayAdapter,
    },
    config::Config,
    error::ApiError,
    web::{router, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use research_copilot_core::ports::{KeyValueStore, PaymentGateway, ResearchService, SystemClock};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Storage & Run Migrations ---
    let store: Arc<dyn KeyValueStore> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL is not set; accounts and history are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    // --- 3. Initialize Service Adapters ---
    let research: Arc<dyn ResearchService> = match &config.openai_api_key {
        Some(api_key) => {
            let openai_client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));
            Arc::new(OpenAiResearchAdapter::new(
                openai_client,
                config.research_model.clone(),
                config.query_timeout,
            ))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; answering queries with offline sample data");
            Arc::new(CannedResearchAdapter::new(Duration::from_millis(1500)))
        }
    };

    let gateway: Option<Arc<dyn PaymentGateway>> = match &config.payments {
        Some(payments) => {
            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;
            Some(Arc::new(RazorpayAdapter::new(http, payments.clone())))
        }
        None => {
            warn!("Razorpay keys are not set; upgrades are disabled");
            None
        }
    };

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        store,
        research,
        gateway,
        Arc::new(SystemClock),
    ));
    let app = router(app_state)?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

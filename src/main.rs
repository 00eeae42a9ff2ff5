use loan_compass_api::{
    assistant::GroundedAssistant,
    config::Config,
    db::Database,
    db_storage::{CatalogStorage, ChatStorage},
    gemini_client::GeminiClient,
    handlers::{self, AppState},
    obs,
    rate_limiter::{BucketStore, RateLimiter},
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection.
/// - Product cache and inference client.
/// - HTTP routes and middleware.
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // Products looked up by the AI endpoint
    let product_cache = Cache::builder()
        .time_to_live(Duration::from_secs(config.product_cache_ttl_secs))
        .max_capacity(10_000)
        .build();
    tracing::info!(
        "Product cache initialized ({}s TTL, 10k capacity)",
        config.product_cache_ttl_secs
    );

    let timeout = Duration::from_secs(config.ai_timeout_secs);
    let gemini = GeminiClient::new(
        config.gemini_base_url.clone(),
        config.google_api_key.clone(),
        config.gemini_model.clone(),
        timeout,
    )
    .map_err(|e| anyhow::anyhow!("Failed to initialize Gemini client: {}", e))?;
    tracing::info!("✓ Gemini client initialized: model {}", gemini.model());

    let app_state = Arc::new(AppState {
        catalog: CatalogStorage::new(db.pool.clone()),
        chats: ChatStorage::new(db.pool.clone()),
        assistant: GroundedAssistant::new(gemini, timeout),
        rate_limiter: RateLimiter::new(BucketStore::new()),
        product_cache,
    });

    let app = handlers::router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

use anyhow::{Context, Result};
use entity_bulk_translation::{config::Config, scheduler, server, store::EntityStore};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("entity_bulk_translation=info".parse()?),
        )
        .init();

    info!("Starting entity bulk translation service");

    // Load configuration from environment
    let config = Arc::new(Config::from_env()?);

    // Open the entity store
    let store = EntityStore::new(&config.database_path)?;

    // Start scheduled sync jobs, if any are configured
    let _scheduler = if !config.schedule_times.is_empty() && !config.sync_pairs.is_empty() {
        Some(scheduler::start_scheduler(Arc::clone(&config), store.clone()).await?)
    } else {
        info!("No sync schedule configured");
        None
    };

    // Serve the admin surface
    let state = server::AppState {
        store,
        config: Arc::clone(&config),
        http: reqwest::Client::new(),
    };
    let app = server::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

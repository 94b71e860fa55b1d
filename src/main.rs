use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use agora_api::api::AppState;
use agora_api::config::Config;
use agora_api::services::PgAuthorizer;
use agora_api::store::{create_pool, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("agora_api=info,tower_http=info")),
        )
        .init();

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!().run(&pool).await?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let authorizer = Arc::new(PgAuthorizer::new(pool));

    let (state, recorder_handle) = AppState::new(
        store.clone(),
        store.clone(),
        store,
        authorizer,
        Duration::from_secs(config.debounce_window_secs),
    );

    let app = agora_api::api::create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Flush any interactions still queued for persistence
    recorder_handle.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

mod allocator;
mod api_doc;
mod app;
mod claims;
mod codes;
mod config;
mod cors;
mod error;
mod handlers;
mod models;
mod routes;
mod state;
mod store;

use anyhow::Context;
use config::Config;
use state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("promo_redeem=info,tower_http=info")),
        )
        .init();

    tracing::info!("promo-redeem starting");

    let config = Config::from_env()?;
    config.log_startup();

    let store = store::connect(&config.store).await?;
    let addr = format!("{}:{}", config.service_host, config.service_port);

    let state = AppState::new(store, config);
    let status = state.allocator.status().await?;
    tracing::info!(
        "Codes loaded: {} total, {} claimed, {} remaining",
        status.total,
        status.claimed,
        status.remaining
    );

    let app = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("promo-redeem stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

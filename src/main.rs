use std::sync::Arc;

use anyhow::{Context, Result};
use flint_core::Config;
use flint_weather::WeatherService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    flint_core::init()?;

    let (config, _) = Config::load_validated()?;

    let service = Arc::new(
        WeatherService::from_config(&config).context("Failed to build weather service")?,
    );
    let router = flint_server::create_router(service, &config.server.static_dir);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("FlintWeather listening on http://{}", addr);
    tracing::info!(
        "Serving static files from {}",
        config.server.static_dir.display()
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("FlintWeather stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

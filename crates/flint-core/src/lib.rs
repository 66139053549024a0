pub mod config;
pub mod error;

pub use config::{
    CacheConfig, Config, GeminiConfig, HttpConfig, NominatimConfig, OpenMeteoConfig,
    ServerConfig, ValidationResult, WeatherApiConfig,
};
pub use error::{QuotaReason, ReqwestErrorExt, SourceError, ValidationError};

use anyhow::Result;

/// Initialize logging for the process
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::info!("FlintWeather core initialized");
    Ok(())
}

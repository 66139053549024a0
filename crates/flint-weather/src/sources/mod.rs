//! Upstream data sources and the traits the orchestrator drives them through.
//!
//! Each source carries a static [`SourceDescriptor`]; the fallback chain is an
//! ordered list of sources filtered by the capability a request needs.

pub mod gemini;
pub mod nominatim;
pub mod open_meteo;
pub mod synthetic;
pub mod weatherapi;

use std::time::Duration;

use async_trait::async_trait;
use flint_core::SourceError;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::chat::WeatherContext;
use crate::types::{
    Coordinate, CurrentConditions, ForecastOutlook, HourlyForecast, LocationInfo, SourceKind,
};

pub use gemini::{GeminiChat, GeminiClient, GeminiWeather};
pub use nominatim::NominatimClient;
pub use open_meteo::OpenMeteoClient;
pub use synthetic::SyntheticWeather;
pub use weatherapi::WeatherApiClient;

/// Kind of data a request asks the chain for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Current,
    Hourly,
    Daily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub current: bool,
    pub hourly: bool,
    pub daily: bool,
}

impl Capabilities {
    pub const CURRENT_ONLY: Self = Self {
        current: true,
        hourly: false,
        daily: false,
    };

    pub const ALL: Self = Self {
        current: true,
        hourly: true,
        daily: true,
    };

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Current => self.current,
            Capability::Hourly => self.hourly,
            Capability::Daily => self.daily,
        }
    }
}

/// Static facts about a source that drive gating in the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    /// Display tag and rate-limiter key
    pub name: &'static str,
    pub kind: SourceKind,
    pub capabilities: Capabilities,
    /// Minimum spacing between calls, if the upstream asks for one
    pub min_interval: Option<Duration>,
    /// Whether calls count against the shared AI quota
    pub quota_limited: bool,
}

/// A provider of weather data.
///
/// `hourly` and `daily` default to `Unsupported`; the chain only calls them on
/// sources whose descriptor advertises the capability.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    fn descriptor(&self) -> &SourceDescriptor;

    async fn current(&self, location: &LocationInfo) -> Result<CurrentConditions, SourceError>;

    async fn hourly(&self, _coordinate: Coordinate) -> Result<Vec<HourlyForecast>, SourceError> {
        Err(SourceError::Unsupported)
    }

    async fn daily(&self, _coordinate: Coordinate) -> Result<ForecastOutlook, SourceError> {
        Err(SourceError::Unsupported)
    }
}

/// A conversational model answering questions about the weather.
#[async_trait]
pub trait ChatSource: Send + Sync {
    fn descriptor(&self) -> &SourceDescriptor;

    async fn reply(&self, message: &str, context: &WeatherContext) -> Result<String, SourceError>;
}

/// Forward and reverse geocoding.
#[async_trait]
pub trait Geocoder: Send + Sync {
    fn descriptor(&self) -> &SourceDescriptor;

    async fn reverse(&self, coordinate: Coordinate) -> Result<LocationInfo, SourceError>;

    async fn search(&self, query: &str) -> Result<Vec<LocationInfo>, SourceError>;
}

/// Shared HTTP client for every upstream; timeouts count as source failures.
pub fn http_client(timeout: Duration) -> Result<Client, SourceError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SourceError::Network(e.to_string()))
}

/// Map a non-success status to a `SourceError`, otherwise decode the JSON body.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, SourceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        return Err(SourceError::from_status(status.as_u16(), snippet));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| SourceError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_supports() {
        assert!(Capabilities::ALL.supports(Capability::Hourly));
        assert!(Capabilities::CURRENT_ONLY.supports(Capability::Current));
        assert!(!Capabilities::CURRENT_ONLY.supports(Capability::Daily));
        assert!(!Capabilities::default().supports(Capability::Current));
    }

    #[test]
    fn test_http_client_builds() {
        assert!(http_client(Duration::from_secs(5)).is_ok());
    }
}

//! Open-Meteo client. Free, no API key required.

use async_trait::async_trait;
use flint_core::{ReqwestErrorExt, SourceError};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use super::{handle_response, Capabilities, SourceDescriptor, WeatherSource};
use crate::types::{percent, CurrentConditions, LocationInfo, SourceKind, WeatherCondition};

pub const SOURCE_NAME: &str = "Open-Meteo";

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,\
precipitation,weather_code,pressure_msl,cloud_cover,wind_speed_10m";

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    current: OpenMeteoCurrent,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoCurrent {
    temperature_2m: f64,
    apparent_temperature: Option<f64>,
    relative_humidity_2m: Option<f64>,
    precipitation: Option<f64>,
    #[serde(default)]
    weather_code: i32,
    pressure_msl: Option<f64>,
    cloud_cover: Option<f64>,
    #[serde(default)]
    wind_speed_10m: f64,
}

/// Secondary verified provider.
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
    descriptor: SourceDescriptor,
}

impl OpenMeteoClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            descriptor: SourceDescriptor {
                name: "open_meteo",
                kind: SourceKind::Provider,
                capabilities: Capabilities::CURRENT_ONLY,
                min_interval: None,
                quota_limited: false,
            },
        }
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    #[instrument(skip(self, location), level = "debug")]
    async fn current(&self, location: &LocationInfo) -> Result<CurrentConditions, SourceError> {
        let url = format!("{}/forecast", self.base_url);
        let latitude = location.latitude.to_string();
        let longitude = location.longitude.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current", CURRENT_FIELDS),
                ("timezone", "auto"),
            ])
            .send()
            .await
            .map_err(ReqwestErrorExt::into_source_error)?;

        let body: OpenMeteoResponse = handle_response(response).await?;
        let now = body.current;
        let condition = WeatherCondition::from_wmo_code(now.weather_code).description();

        let mut current = CurrentConditions::new(
            SOURCE_NAME,
            SourceKind::Provider,
            condition,
            now.temperature_2m,
            now.apparent_temperature.unwrap_or(now.temperature_2m),
            percent(now.relative_humidity_2m.unwrap_or(50.0)),
            now.wind_speed_10m,
        );
        current.description = Some(format!("Currently {}", condition.to_lowercase()));
        current.pressure_mb = now.pressure_msl;
        current.cloud_cover_percent = now.cloud_cover.map(percent);
        current.precipitation_mm = now.precipitation;
        Ok(current)
    }
}

//! REST API type definitions

use std::sync::Arc;

use flint_core::ValidationError;
use flint_weather::{Coordinate, HourlyForecast, LocationInfo, WeatherService};
use serde::{Deserialize, Serialize};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WeatherService>,
}

/// A coordinate as sent by the browser: a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumericField {
    Number(f64),
    Text(String),
}

impl NumericField {
    /// Unparsable text becomes NaN, which coordinate validation rejects.
    fn value(&self) -> f64 {
        match self {
            NumericField::Number(n) => *n,
            NumericField::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
        }
    }
}

/// Body of every coordinate-keyed endpoint.
#[derive(Debug, Deserialize)]
pub struct CoordinatesPayload {
    #[serde(default)]
    pub latitude: Option<NumericField>,
    #[serde(default)]
    pub longitude: Option<NumericField>,
}

impl CoordinatesPayload {
    pub fn coordinate(&self) -> Result<Coordinate, ValidationError> {
        let latitude = self
            .latitude
            .as_ref()
            .ok_or(ValidationError::MissingField("latitude"))?;
        let longitude = self
            .longitude
            .as_ref()
            .ok_or(ValidationError::MissingField("longitude"))?;
        Coordinate::new(latitude.value(), longitude.value())
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<LocationInfo>,
}

#[derive(Debug, Serialize)]
pub struct HourlyResponse {
    pub hourly_forecast: Vec<HourlyForecast>,
}

/// Chat request. `weather_data` is whatever weather payload the client
/// last received, echoed back verbatim.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub weather_data: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

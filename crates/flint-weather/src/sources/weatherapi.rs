//! WeatherAPI.com client: current conditions, hourly and 7-day forecasts.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use flint_core::{ReqwestErrorExt, SourceError, WeatherApiConfig};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use super::{handle_response, Capabilities, SourceDescriptor, WeatherSource};
use crate::types::{
    percent, round1, AirQuality, Coordinate, CurrentConditions, DailyForecast, ForecastOutlook,
    HourlyForecast, LocationInfo, SourceKind,
};

pub const SOURCE_NAME: &str = "WeatherAPI.com";

#[derive(Debug, Default, Deserialize)]
struct ConditionText {
    #[serde(default)]
    text: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: ApiCurrent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiCurrent {
    temp_c: f64,
    temp_f: f64,
    feelslike_c: f64,
    condition: ConditionText,
    humidity: f64,
    wind_kph: f64,
    wind_dir: Option<String>,
    pressure_mb: Option<f64>,
    vis_km: Option<f64>,
    uv: Option<f64>,
    cloud: Option<f64>,
    precip_mm: Option<f64>,
    air_quality: Option<ApiAirQuality>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiAirQuality {
    #[serde(rename = "us-epa-index")]
    us_epa_index: Option<u8>,
    #[serde(rename = "gb-defra-index")]
    gb_defra_index: Option<u8>,
    pm2_5: f64,
    pm10: f64,
    co: f64,
    no2: f64,
    o3: f64,
    so2: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    current: ApiCurrent,
    forecast: ApiForecast,
}

#[derive(Debug, Deserialize)]
struct ApiForecast {
    #[serde(default)]
    forecastday: Vec<ApiForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ApiForecastDay {
    date: String,
    #[serde(default)]
    day: ApiDay,
    #[serde(default)]
    hour: Vec<ApiHour>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ApiDay {
    maxtemp_c: f64,
    mintemp_c: f64,
    condition: ConditionText,
    daily_chance_of_rain: f64,
    daily_chance_of_snow: f64,
    avghumidity: f64,
    maxwind_kph: f64,
}

impl Default for ApiDay {
    fn default() -> Self {
        Self {
            maxtemp_c: 25.0,
            mintemp_c: 15.0,
            condition: ConditionText::default(),
            daily_chance_of_rain: 0.0,
            daily_chance_of_snow: 0.0,
            avghumidity: 50.0,
            maxwind_kph: 10.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ApiHour {
    time: String,
    temp_c: f64,
    chance_of_rain: f64,
    condition: ConditionText,
    humidity: f64,
    wind_kph: f64,
}

impl Default for ApiHour {
    fn default() -> Self {
        Self {
            time: String::new(),
            temp_c: 20.0,
            chance_of_rain: 0.0,
            condition: ConditionText::default(),
            humidity: 50.0,
            wind_kph: 0.0,
        }
    }
}

fn or_default_text(text: String, fallback: &str) -> String {
    if text.is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

impl ApiCurrent {
    fn into_conditions(self) -> CurrentConditions {
        let condition = or_default_text(self.condition.text, "Unknown");
        let mut current = CurrentConditions::new(
            SOURCE_NAME,
            SourceKind::Provider,
            condition.clone(),
            self.temp_c,
            self.feelslike_c,
            percent(self.humidity),
            self.wind_kph,
        );
        current.temperature_fahrenheit = Some(self.temp_f);
        current.description = Some(format!("Currently {}", condition.to_lowercase()));
        current.wind_direction = self.wind_dir;
        current.pressure_mb = self.pressure_mb;
        current.visibility_km = self.vis_km;
        current.uv_index = self.uv;
        current.cloud_cover_percent = self.cloud.map(percent);
        current.precipitation_mm = self.precip_mm;
        current
    }
}

impl ApiHour {
    fn into_hourly(self) -> HourlyForecast {
        // "2026-06-10 14:00" -> "14:00"
        let hour = self
            .time
            .split_whitespace()
            .last()
            .unwrap_or("00:00")
            .to_string();
        HourlyForecast {
            hour,
            temperature_celsius: round1(self.temp_c),
            precipitation_chance: percent(self.chance_of_rain),
            condition: or_default_text(self.condition.text, "Clear"),
            humidity: Some(percent(self.humidity)),
            wind_kph: Some(round1(self.wind_kph)),
        }
    }
}

impl ApiForecastDay {
    fn into_daily(self) -> Result<DailyForecast, SourceError> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| SourceError::Malformed(format!("bad forecast date {}: {}", self.date, e)))?;
        let day = self.day;
        Ok(DailyForecast {
            day: weekday_name(date).to_string(),
            date: self.date,
            max_temp_c: round1(day.maxtemp_c),
            min_temp_c: round1(day.mintemp_c),
            condition: or_default_text(day.condition.text, "Clear"),
            icon: Some(day.condition.icon).filter(|i| !i.is_empty()),
            rain_chance: percent(day.daily_chance_of_rain),
            snow_chance: percent(day.daily_chance_of_snow),
            avg_humidity: percent(day.avghumidity),
            max_wind_kph: round1(day.maxwind_kph),
        })
    }
}

impl From<ApiAirQuality> for AirQuality {
    fn from(aq: ApiAirQuality) -> Self {
        AirQuality {
            us_epa_index: aq.us_epa_index.unwrap_or(1),
            gb_defra_index: Some(aq.gb_defra_index.unwrap_or(1)),
            pm2_5: round1(aq.pm2_5),
            pm10: round1(aq.pm10),
            co: Some(round1(aq.co)),
            no2: Some(round1(aq.no2)),
            o3: Some(round1(aq.o3)),
            so2: Some(round1(aq.so2)),
        }
    }
}

pub(crate) fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    }
}

/// Verified provider; requires an API key.
pub struct WeatherApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    descriptor: SourceDescriptor,
}

impl WeatherApiClient {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            descriptor: SourceDescriptor {
                name: "weatherapi",
                kind: SourceKind::Provider,
                capabilities: Capabilities::ALL,
                min_interval: None,
                quota_limited: false,
            },
        }
    }

    /// Returns `None` when no API key is configured.
    pub fn from_config(client: Client, config: &WeatherApiConfig) -> Option<Self> {
        let api_key = config.api_key.as_deref().filter(|k| !k.is_empty())?;
        Some(Self::new(client, &config.base_url, api_key))
    }

    async fn forecast(
        &self,
        latitude: f64,
        longitude: f64,
        days: u8,
        extras: &str,
    ) -> Result<ForecastResponse, SourceError> {
        let url = format!("{}/forecast.json", self.base_url);
        let q = format!("{},{}", latitude, longitude);
        let days = days.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", q.as_str()),
                ("days", days.as_str()),
                ("aqi", extras),
                ("alerts", extras),
            ])
            .send()
            .await
            .map_err(ReqwestErrorExt::into_source_error)?;

        handle_response(response).await
    }
}

#[async_trait]
impl WeatherSource for WeatherApiClient {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    #[instrument(skip(self, location), level = "debug")]
    async fn current(&self, location: &LocationInfo) -> Result<CurrentConditions, SourceError> {
        let url = format!("{}/current.json", self.base_url);
        let q = format!("{},{}", location.latitude, location.longitude);

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("q", q.as_str()), ("aqi", "no")])
            .send()
            .await
            .map_err(ReqwestErrorExt::into_source_error)?;

        let body: CurrentResponse = handle_response(response).await?;
        Ok(body.current.into_conditions())
    }

    #[instrument(skip(self), level = "debug")]
    async fn hourly(&self, coordinate: Coordinate) -> Result<Vec<HourlyForecast>, SourceError> {
        let body = self
            .forecast(coordinate.latitude(), coordinate.longitude(), 1, "no")
            .await?;

        let hours: Vec<HourlyForecast> = body
            .forecast
            .forecastday
            .into_iter()
            .next()
            .map(|day| day.hour.into_iter().map(ApiHour::into_hourly).collect())
            .unwrap_or_default();

        if hours.is_empty() {
            return Err(SourceError::Malformed("no hourly data".to_string()));
        }
        tracing::info!("Returning {} hours of real forecast data", hours.len());
        Ok(hours)
    }

    #[instrument(skip(self), level = "debug")]
    async fn daily(&self, coordinate: Coordinate) -> Result<ForecastOutlook, SourceError> {
        let body = self
            .forecast(coordinate.latitude(), coordinate.longitude(), 7, "yes")
            .await?;

        if body.forecast.forecastday.is_empty() {
            return Err(SourceError::Malformed("no forecast days".to_string()));
        }

        let forecast = body
            .forecast
            .forecastday
            .into_iter()
            .map(ApiForecastDay::into_daily)
            .collect::<Result<Vec<_>, _>>()?;
        let air_quality = body.current.air_quality.unwrap_or_default().into();

        tracing::info!("Returning {} days of real forecast", forecast.len());
        Ok(ForecastOutlook {
            forecast,
            air_quality,
        })
    }
}

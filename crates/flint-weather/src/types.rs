use chrono::{DateTime, Utc};
use flint_core::ValidationError;
use serde::{Deserialize, Serialize};

/// A validated point on the globe.
///
/// Fields are private so an out-of-range coordinate cannot be constructed;
/// anything holding a `Coordinate` has already passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if valid {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(ValidationError::InvalidCoordinates {
                latitude,
                longitude,
            })
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Deterministic cache key from coordinates rounded to 4 decimals
    /// (about 11 m), e.g. `weather_40_7128_-74_0060`.
    pub fn cache_key(&self, prefix: &str) -> String {
        format!(
            "{}_{:.4}_{:.4}",
            prefix,
            round4(self.latitude),
            round4(self.longitude)
        )
        .replace('.', "_")
    }
}

/// Round to 4 decimals; `+ 0.0` folds `-0.0` into `0.0` so both signs of a
/// near-zero value share one key.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0 + 0.0
}

/// Strip markup-ish characters and clamp length (in chars).
pub fn sanitize_input(text: &str, max_chars: usize) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | '&' | '\\'))
        .collect();
    cleaned.trim().chars().take(max_chars).collect()
}

/// Human-readable place for a coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub locality: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub display_name: String,
}

impl LocationInfo {
    /// Placeholder used when reverse geocoding fails
    pub fn unknown(coordinate: Coordinate) -> Self {
        Self {
            latitude: coordinate.latitude(),
            longitude: coordinate.longitude(),
            locality: "Unknown".to_string(),
            city: "Unknown".to_string(),
            region: String::new(),
            country: "Unknown".to_string(),
            display_name: String::new(),
        }
    }
}

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    MainlyClear,
    PartlyCloudy,
    Overcast,
    Fog,
    Drizzle,
    LightRain,
    Rain,
    HeavyRain,
    Snow,
    Thunderstorm,
    Unknown,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1 => Self::MainlyClear,
            2 => Self::PartlyCloudy,
            3 => Self::Overcast,
            45 | 48 => Self::Fog,
            51 | 53 | 55 | 56 | 57 => Self::Drizzle,
            61 | 80 => Self::LightRain,
            63 | 66 | 81 => Self::Rain,
            65 | 67 | 82 => Self::HeavyRain,
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Unknown,
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear sky",
            Self::MainlyClear => "Mainly clear",
            Self::PartlyCloudy => "Partly cloudy",
            Self::Overcast => "Overcast",
            Self::Fog => "Foggy",
            Self::Drizzle => "Drizzle",
            Self::LightRain => "Light rain",
            Self::Rain => "Moderate rain",
            Self::HeavyRain => "Heavy rain",
            Self::Snow => "Snow",
            Self::Thunderstorm => "Thunderstorm",
            Self::Unknown => "Unknown",
        }
    }
}

/// Which tier of the source chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Ai,
    Provider,
    Synthetic,
}

impl SourceKind {
    /// Only verified providers report measured data
    pub fn is_real_data(&self) -> bool {
        matches!(self, SourceKind::Provider)
    }
}

/// Current conditions from exactly one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub condition: String,
    pub temperature_celsius: f64,
    pub feels_like_celsius: f64,
    pub humidity_percent: u8,
    pub wind_speed_kmh: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_fahrenheit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv_index: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_cover_percent: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<String>,
    pub source: String,
    pub is_real_data: bool,
    pub timestamp: DateTime<Utc>,
}

impl CurrentConditions {
    /// Minimal record; optional extras start empty.
    pub fn new(
        source: &str,
        kind: SourceKind,
        condition: impl Into<String>,
        temperature_celsius: f64,
        feels_like_celsius: f64,
        humidity_percent: u8,
        wind_speed_kmh: f64,
    ) -> Self {
        Self {
            condition: condition.into(),
            temperature_celsius,
            feels_like_celsius,
            humidity_percent,
            wind_speed_kmh,
            temperature_fahrenheit: Some(celsius_to_fahrenheit(temperature_celsius)),
            description: None,
            wind_direction: None,
            pressure_mb: None,
            visibility_km: None,
            uv_index: None,
            cloud_cover_percent: None,
            precipitation_mm: None,
            alerts: Vec::new(),
            source: source.to_string(),
            is_real_data: kind.is_real_data(),
            timestamp: Utc::now(),
        }
    }
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    round1(celsius * 9.0 / 5.0 + 32.0)
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Clamp a loosely-typed percentage into 0..=100
pub fn percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub today: String,
    pub tomorrow: String,
    pub day_after: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: String,
    pub sunset: String,
}

/// Complete payload of the weather endpoint, cached as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub current_weather: CurrentConditions,
    pub forecast: ForecastSummary,
    pub sun_times: SunTimes,
    pub moon_phase: String,
    pub location: LocationInfo,
    pub weather_tips: Vec<String>,
    pub source: String,
    pub source_kind: SourceKind,
    pub is_real_data: bool,
}

/// Hourly forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    /// "HH:00"
    pub hour: String,
    pub temperature_celsius: f64,
    pub precipitation_chance: u8,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_kph: Option<f64>,
}

/// Daily forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub day: String,
    /// YYYY-MM-DD
    pub date: String,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub rain_chance: u8,
    pub snow_chance: u8,
    pub avg_humidity: u8,
    pub max_wind_kph: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    pub us_epa_index: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gb_defra_index: Option<u8>,
    pub pm2_5: f64,
    pub pm10: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o3: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub so2: Option<f64>,
}

/// Multi-day forecast plus air quality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutlook {
    pub forecast: Vec<DailyForecast>,
    pub air_quality: AirQuality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_accepts_bounds() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(40.0, -74.0).is_ok());
    }

    #[test]
    fn test_coordinate_rejects_out_of_range() {
        assert_eq!(
            Coordinate::new(91.0, 0.0),
            Err(ValidationError::InvalidCoordinates {
                latitude: 91.0,
                longitude: 0.0
            })
        );
        assert!(Coordinate::new(0.0, -180.5).is_err());
    }

    #[test]
    fn test_coordinate_rejects_non_finite() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_cache_key_rounds_and_replaces_dots() {
        let coord = Coordinate::new(40.712_84, -74.006_01).unwrap();
        assert_eq!(coord.cache_key("weather"), "weather_40_7128_-74_0060");

        let nearby = Coordinate::new(40.712_79, -74.006_04).unwrap();
        assert_eq!(coord.cache_key("weather"), nearby.cache_key("weather"));
    }

    #[test]
    fn test_cache_key_near_zero_ignores_sign() {
        let south_west = Coordinate::new(-0.000_01, -0.000_04).unwrap();
        let north_east = Coordinate::new(0.000_01, 0.000_04).unwrap();

        assert_eq!(south_west.cache_key("weather"), "weather_0_0000_0_0000");
        assert_eq!(south_west.cache_key("weather"), north_east.cache_key("weather"));
    }

    #[test]
    fn test_sanitize_input() {
        assert_eq!(sanitize_input("  <b>Paris</b> & \"co\" ", 200), "bParis/b  co");
        assert_eq!(sanitize_input("abcdef", 3), "abc");
        assert_eq!(sanitize_input("   ", 10), "");
    }

    #[test]
    fn test_sanitize_counts_chars_not_bytes() {
        assert_eq!(sanitize_input("héllo wörld", 4), "héll");
    }

    #[test]
    fn test_wmo_codes() {
        assert_eq!(WeatherCondition::from_wmo_code(0), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_wmo_code(3).description(), "Overcast");
        assert_eq!(WeatherCondition::from_wmo_code(63).description(), "Moderate rain");
        assert_eq!(WeatherCondition::from_wmo_code(95), WeatherCondition::Thunderstorm);
        assert_eq!(WeatherCondition::from_wmo_code(999), WeatherCondition::Unknown);
    }

    #[test]
    fn test_unit_helpers() {
        assert_eq!(celsius_to_fahrenheit(25.0), 77.0);
        assert_eq!(round1(21.456), 21.5);
        assert_eq!(percent(150.0), 100);
        assert_eq!(percent(-3.0), 0);
        assert_eq!(percent(64.6), 65);
    }

    #[test]
    fn test_source_kind_real_data() {
        assert!(SourceKind::Provider.is_real_data());
        assert!(!SourceKind::Ai.is_real_data());
        assert!(!SourceKind::Synthetic.is_real_data());
    }

    #[test]
    fn test_unknown_location() {
        let coord = Coordinate::new(1.5, 2.5).unwrap();
        let loc = LocationInfo::unknown(coord);
        assert_eq!(loc.city, "Unknown");
        assert_eq!(loc.latitude, 1.5);
    }
}

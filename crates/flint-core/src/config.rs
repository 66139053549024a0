use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Cache sizing and per-source TTLs
    pub cache: CacheConfig,

    /// Gemini generative AI settings
    pub gemini: GeminiConfig,

    /// WeatherAPI.com (primary provider)
    pub weather_api: WeatherApiConfig,

    /// Open-Meteo (secondary provider)
    pub open_meteo: OpenMeteoConfig,

    /// Nominatim geocoding
    pub nominatim: NominatimConfig,

    /// Outbound HTTP settings
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served for non-API paths
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            static_dir: PathBuf::from("static"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries per cache
    pub max_size: usize,
    /// TTL for AI-generated weather
    pub ai_ttl_secs: u64,
    /// TTL for synthetic fallback data
    pub synthetic_ttl_secs: u64,
    /// TTL for data from a real provider
    pub provider_ttl_secs: u64,
    /// TTL for reverse-geocoded locations
    pub location_ttl_secs: u64,
    /// TTL for AI chat replies
    pub chat_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 500,
            ai_ttl_secs: 1800,
            synthetic_ttl_secs: 1800,
            provider_ttl_secs: 3600,
            location_ttl_secs: 3600,
            chat_ttl_secs: 7200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// Whether the AI source starts enabled
    pub enabled: bool,
    /// API key (can also be set via GEMINI_API_KEY)
    pub api_key: Option<String>,
    /// generateContent endpoint
    pub api_url: String,
    /// Minimum seconds between calls per AI endpoint
    pub rate_limit_delay_secs: f64,
    /// Free tier per-minute ceiling
    pub max_requests_per_minute: usize,
    /// Free tier per-day ceiling
    pub max_requests_per_day: u32,
    pub max_output_tokens: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            api_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
                .to_string(),
            rate_limit_delay_secs: 10.0,
            max_requests_per_minute: 5,
            max_requests_per_day: 150,
            max_output_tokens: 300,
        }
    }
}

impl GeminiConfig {
    /// Enabled and holding something that looks like a key
    pub fn is_configured(&self) -> bool {
        self.enabled && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_delay_secs.max(0.0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherApiConfig {
    /// API key (can also be set via WEATHER_API_KEY)
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for WeatherApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "http://api.weatherapi.com/v1".to_string(),
        }
    }
}

impl WeatherApiConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenMeteoConfig {
    pub enabled: bool,
    pub base_url: String,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.open-meteo.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NominatimConfig {
    pub base_url: String,
    /// Nominatim's usage policy requires an identifying agent
    pub user_agent: String,
    /// Minimum seconds between calls (usage policy: 1 req/s)
    pub min_interval_secs: f64,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "FlintWeather/0.1.0".to_string(),
            min_interval_secs: 1.0,
        }
    }
}

impl NominatimConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(self.min_interval_secs.max(0.0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout applied to every outbound request
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load configuration from the default file location plus environment
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os("FLINT_CONFIG") {
            Some(p) => PathBuf::from(p),
            None => Self::config_path()?,
        };
        Self::load_from(&path)
    }

    /// Load configuration from `path` (optional) layered under `FLINT__*` env vars
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config: Config = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("FLINT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to read config")?
            .try_deserialize()
            .context("Failed to parse config")?;

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Apply the unprefixed variables deployments already set
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Some(key) = lookup("WEATHER_API_KEY") {
            self.weather_api.api_key = Some(key);
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.gemini.api_url, "gemini.api_url", &mut result);
        self.validate_url(&self.weather_api.base_url, "weather_api.base_url", &mut result);
        self.validate_url(&self.open_meteo.base_url, "open_meteo.base_url", &mut result);
        self.validate_url(&self.nominatim.base_url, "nominatim.base_url", &mut result);

        if self.cache.max_size == 0 {
            result.add_error("cache.max_size", "Cache capacity must be greater than 0");
        }

        if self.cache.ai_ttl_secs > self.cache.provider_ttl_secs
            || self.cache.synthetic_ttl_secs > self.cache.provider_ttl_secs
        {
            result.add_warning(
                "cache",
                "AI/synthetic TTL is longer than the real-provider TTL",
            );
        }

        if self.http.request_timeout_secs == 0 {
            result.add_error("http.request_timeout_secs", "Request timeout must be greater than 0");
        }

        if self.gemini.enabled {
            if self.gemini.max_requests_per_minute == 0 || self.gemini.max_requests_per_day == 0 {
                result.add_warning(
                    "gemini",
                    "Quota ceiling is 0 - the AI source will never be used",
                );
            }
            if !self.gemini.is_configured() {
                result.add_warning(
                    "gemini.api_key",
                    "Gemini API key not configured - AI source will be skipped",
                );
            }
        }

        if !self.weather_api.is_configured() {
            result.add_warning(
                "weather_api.api_key",
                "WeatherAPI.com key not configured - primary provider will be skipped",
            );
        }

        if self.nominatim.user_agent.trim().is_empty() {
            result.add_error("nominatim.user_agent", "Nominatim requires a User-Agent");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("flint");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        // Missing API keys are warnings, not errors
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result.warnings.iter().any(|w| w.field == "gemini.api_key"));
    }

    #[test]
    fn test_default_values_match_free_tier() {
        let config = Config::default();
        assert_eq!(config.cache.max_size, 500);
        assert_eq!(config.gemini.max_requests_per_minute, 5);
        assert_eq!(config.gemini.max_requests_per_day, 150);
        assert_eq!(config.gemini.rate_limit_delay(), Duration::from_secs(10));
        assert_eq!(config.nominatim.min_interval(), Duration::from_secs(1));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.open_meteo.base_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.nominatim.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "nominatim.base_url"));
    }

    #[test]
    fn test_zero_cache_capacity() {
        let mut config = Config::default();
        config.cache.max_size = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "cache.max_size"));
    }

    #[test]
    fn test_gemini_is_configured() {
        let mut gemini = GeminiConfig::default();
        assert!(!gemini.is_configured());
        gemini.api_key = Some("  ".to_string());
        assert!(!gemini.is_configured());
        gemini.api_key = Some("key".to_string());
        assert!(gemini.is_configured());
        gemini.enabled = false;
        assert!(!gemini.is_configured());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| match key {
            "GEMINI_API_KEY" => Some("g-key".to_string()),
            "PORT" => Some("9090".to_string()),
            _ => None,
        });
        assert_eq!(config.gemini.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.server.port, 9090);
        assert!(config.weather_api.api_key.is_none());
    }

    #[test]
    fn test_env_override_ignores_bad_port() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| (key == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_load_from_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[cache]\nmax_size = 42\n\n[gemini]\nenabled = false\nmax_requests_per_minute = 2"
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.cache.max_size, 42);
        assert_eq!(config.cache.provider_ttl_secs, 3600);
        assert!(!config.gemini.enabled);
        assert_eq!(config.gemini.max_requests_per_minute, 2);
        assert_eq!(config.gemini.max_requests_per_day, 150);
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.cache.max_size, 500);
        assert_eq!(config.nominatim.user_agent, "FlintWeather/0.1.0");
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}

//! Weather service for FlintWeather
//!
//! Resolves weather, forecasts, place names and chat replies through an
//! ordered chain of sources (Gemini, WeatherAPI.com, Open-Meteo) with
//! TTL caching, per-source rate limiting, an AI quota and a synthetic
//! fallback that always answers.

pub mod cache;
pub mod chat;
pub mod clock;
pub mod quota;
pub mod rate_limit;
pub mod report;
pub mod service;
pub mod sources;
pub mod types;

pub use cache::{CacheStats, TtlCache};
pub use chat::{LocalAssistant, WeatherContext};
pub use clock::{Clock, SystemClock};
pub use quota::{QuotaDecision, QuotaSnapshot, QuotaTracker};
pub use rate_limit::RateLimiter;
pub use service::{
    CacheTtls, HealthReport, WeatherService, WeatherServiceBuilder, CHAT_MAX_CHARS,
    SEARCH_MAX_CHARS,
};
pub use sources::{
    Capabilities, Capability, ChatSource, Geocoder, SourceDescriptor, WeatherSource,
};
pub use types::*;

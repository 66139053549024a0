//! Fallback orchestration across cache, AI, verified providers and synthetic
//! data.
//!
//! A request first consults the cache. On a miss the source chain is walked
//! in order, filtered by the capability the request needs; each source is
//! gated by the AI flag, the shared quota and the per-source rate limiter.
//! The first success wins and is cached with a TTL chosen by its kind. When
//! every source fails the synthetic generator answers.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Timelike, Utc};
use flint_core::{CacheConfig, Config, SourceError};
use serde::Serialize;

use crate::cache::{CacheStats, TtlCache};
use crate::chat::{chat_cache_key, LocalAssistant, WeatherContext, EMPTY_MESSAGE_REPLY};
use crate::clock::{Clock, SystemClock};
use crate::quota::{QuotaDecision, QuotaSnapshot, QuotaTracker};
use crate::rate_limit::RateLimiter;
use crate::report::build_report;
use crate::sources::{
    http_client, Capability, ChatSource, GeminiChat, GeminiClient, GeminiWeather, Geocoder,
    NominatimClient, OpenMeteoClient, SourceDescriptor, SyntheticWeather, WeatherApiClient,
    WeatherSource,
};
use crate::types::{
    sanitize_input, Coordinate, ForecastOutlook, HourlyForecast, LocationInfo, SourceKind,
    WeatherReport,
};

pub const SEARCH_MAX_CHARS: usize = 200;
pub const CHAT_MAX_CHARS: usize = 500;

type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Values stored in the shared weather cache. Keys are namespaced by prefix,
/// so a key always maps to one variant.
#[derive(Debug, Clone)]
pub enum CachedPayload {
    Report(WeatherReport),
    Hourly(Vec<HourlyForecast>),
    Outlook(ForecastOutlook),
    Chat(String),
}

/// Time-to-live per kind of cached result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub ai: Duration,
    pub synthetic: Duration,
    pub provider: Duration,
    pub location: Duration,
    pub chat: Duration,
}

impl CacheTtls {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            ai: Duration::from_secs(config.ai_ttl_secs),
            synthetic: Duration::from_secs(config.synthetic_ttl_secs),
            provider: Duration::from_secs(config.provider_ttl_secs),
            location: Duration::from_secs(config.location_ttl_secs),
            chat: Duration::from_secs(config.chat_ttl_secs),
        }
    }

    pub fn for_kind(&self, kind: SourceKind) -> Duration {
        match kind {
            SourceKind::Ai => self.ai,
            SourceKind::Provider => self.provider,
            SourceKind::Synthetic => self.synthetic,
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheSizes {
    pub weather: usize,
    pub location: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheCounters {
    pub weather: CacheStats,
    pub location: CacheStats,
}

/// Liveness payload for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub cache_stats: CacheSizes,
    pub cache_counters: CacheCounters,
    pub gemini_enabled: bool,
    pub quota: QuotaSnapshot,
}

pub struct WeatherService {
    weather_sources: Vec<Arc<dyn WeatherSource>>,
    chat_sources: Vec<Arc<dyn ChatSource>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    synthetic: SyntheticWeather,
    assistant: LocalAssistant,
    weather_cache: TtlCache<CachedPayload>,
    location_cache: TtlCache<LocationInfo>,
    rate_limiter: Arc<RateLimiter>,
    quota: Arc<QuotaTracker>,
    ai_enabled: AtomicBool,
    ttls: CacheTtls,
    clock: Arc<dyn Clock>,
}

impl WeatherService {
    pub fn builder() -> WeatherServiceBuilder {
        WeatherServiceBuilder::default()
    }

    /// Compose the production chain: Gemini, WeatherAPI.com, Open-Meteo,
    /// each only when configured, with Nominatim for geocoding.
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let client = http_client(config.http.request_timeout())?;

        let mut builder = Self::builder()
            .cache_capacity(config.cache.max_size)
            .ttls(CacheTtls::from_config(&config.cache))
            .quota_limits(
                config.gemini.max_requests_per_minute,
                config.gemini.max_requests_per_day,
            )
            .geocoder(Arc::new(NominatimClient::from_config(
                client.clone(),
                &config.nominatim,
            )));

        let gemini = config
            .gemini
            .is_configured()
            .then(|| GeminiClient::from_config(client.clone(), &config.gemini))
            .flatten();
        let ai_enabled = gemini.is_some();
        if let Some(gemini) = gemini {
            let gemini = Arc::new(gemini);
            let delay = config.gemini.rate_limit_delay();
            builder = builder
                .weather_source(Arc::new(GeminiWeather::new(gemini.clone(), delay)))
                .chat_source(Arc::new(GeminiChat::new(gemini, delay)));
        }

        if let Some(weather_api) = WeatherApiClient::from_config(client.clone(), &config.weather_api)
        {
            builder = builder.weather_source(Arc::new(weather_api));
        }

        if config.open_meteo.enabled {
            builder = builder.weather_source(Arc::new(OpenMeteoClient::new(
                client,
                &config.open_meteo.base_url,
            )));
        }

        tracing::info!(
            "Gemini: {}",
            if ai_enabled { "Enabled" } else { "Disabled" }
        );
        tracing::info!(
            "Weather API: {}",
            if config.weather_api.is_configured() {
                "Configured"
            } else {
                "Not configured"
            }
        );

        Ok(builder.ai_enabled(ai_enabled).build())
    }

    pub fn ai_enabled(&self) -> bool {
        self.ai_enabled.load(Ordering::SeqCst)
    }

    /// One-way switch; nothing turns the AI back on for this process.
    fn disable_ai(&self, source: &str) {
        if self.ai_enabled.swap(false, Ordering::SeqCst) {
            tracing::warn!("{} hit the upstream rate limit, disabling AI sources", source);
        }
    }

    fn ensure_enabled(&self, descriptor: &SourceDescriptor) -> Result<(), SourceError> {
        if descriptor.kind == SourceKind::Ai && !self.ai_enabled() {
            return Err(SourceError::Disabled);
        }
        Ok(())
    }

    /// Gate a single source call: AI flag, quota, rate limit. Quota is
    /// recorded once the request has been sent, whatever its outcome.
    ///
    /// The AI flag is checked again after the rate-limit wait, since another
    /// request may have disabled the source while this one slept.
    async fn attempt<T>(
        &self,
        descriptor: &SourceDescriptor,
        request: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, SourceError> {
        self.ensure_enabled(descriptor)?;

        if descriptor.quota_limited {
            if let QuotaDecision::Denied(reason) = self.quota.can_make_request() {
                tracing::warn!("Gemini {} limit reached, skipping {}", reason, descriptor.name);
                return Err(SourceError::QuotaExceeded(reason));
            }
        }

        if let Some(interval) = descriptor.min_interval {
            self.rate_limiter
                .wait_if_needed(descriptor.name, interval)
                .await;
            self.ensure_enabled(descriptor)?;
        }

        let result = request.await;

        if descriptor.quota_limited {
            self.quota.record_request();
        }
        if descriptor.kind == SourceKind::Ai && matches!(result, Err(SourceError::RateLimited)) {
            self.disable_ai(descriptor.name);
        }
        result
    }

    /// Walk the chain in order and return the first success from a source
    /// advertising `capability`.
    async fn first_success<'a, T>(
        &'a self,
        capability: Capability,
        fetch: impl Fn(&'a dyn WeatherSource) -> SourceFuture<'a, T>,
    ) -> Option<(T, SourceKind)> {
        for source in &self.weather_sources {
            let descriptor = source.descriptor();
            if !descriptor.capabilities.supports(capability) {
                continue;
            }

            match self.attempt(descriptor, fetch(source.as_ref())).await {
                Ok(value) => {
                    tracing::info!("Using {} for {:?}", descriptor.name, capability);
                    return Some((value, descriptor.kind));
                }
                Err(e) => {
                    tracing::debug!("{} failed for {:?}: {}", descriptor.name, capability, e);
                }
            }
        }
        None
    }

    /// Current weather report for a validated coordinate. Never fails.
    pub async fn fetch_weather(&self, coordinate: Coordinate) -> WeatherReport {
        let key = coordinate.cache_key("weather");
        if let Some(CachedPayload::Report(report)) = self.weather_cache.get(&key) {
            tracing::info!("Using cached weather");
            return report;
        }

        let location = self
            .fetch_location(coordinate)
            .await
            .unwrap_or_else(|| LocationInfo::unknown(coordinate));

        let location_ref = &location;
        let (current, kind) = match self
            .first_success(Capability::Current, move |source| {
                source.current(location_ref)
            })
            .await
        {
            Some(found) => found,
            None => {
                tracing::warn!("Using synthetic weather data");
                (self.synthetic.current(coordinate), SourceKind::Synthetic)
            }
        };

        let report = build_report(current, location, kind);
        self.weather_cache.set(
            key,
            CachedPayload::Report(report.clone()),
            self.ttls.for_kind(kind),
        );
        report
    }

    /// Reverse geocode, cached. `None` when the lookup fails.
    pub async fn fetch_location(&self, coordinate: Coordinate) -> Option<LocationInfo> {
        let key = coordinate.cache_key("location");
        if let Some(location) = self.location_cache.get(&key) {
            return Some(location);
        }

        let geocoder = self.geocoder.as_ref()?;
        match self
            .attempt(geocoder.descriptor(), geocoder.reverse(coordinate))
            .await
        {
            Ok(location) => {
                self.location_cache
                    .set(key, location.clone(), self.ttls.location);
                Some(location)
            }
            Err(e) => {
                tracing::error!("Geocoding error: {}", e);
                None
            }
        }
    }

    /// Place search. Empty or failed searches yield an empty list.
    pub async fn search_locations(&self, query: &str) -> Vec<LocationInfo> {
        let query = sanitize_input(query, SEARCH_MAX_CHARS);
        if query.is_empty() {
            return Vec::new();
        }
        let Some(geocoder) = self.geocoder.as_ref() else {
            return Vec::new();
        };

        match self
            .attempt(geocoder.descriptor(), geocoder.search(&query))
            .await
        {
            Ok(results) => results,
            Err(e) => {
                tracing::error!("Search error: {}", e);
                Vec::new()
            }
        }
    }

    /// 24-hour forecast from the first hourly-capable source, else synthetic.
    pub async fn fetch_hourly(&self, coordinate: Coordinate) -> Vec<HourlyForecast> {
        let key = coordinate.cache_key("hourly");
        if let Some(CachedPayload::Hourly(hours)) = self.weather_cache.get(&key) {
            return hours;
        }

        let (hours, kind) = match self
            .first_success(Capability::Hourly, move |source| source.hourly(coordinate))
            .await
        {
            Some(found) => found,
            None => {
                tracing::warn!("Using fallback synthetic hourly data");
                let start_hour = self.clock.now().with_timezone(&Local).hour();
                (self.synthetic.hourly(start_hour), SourceKind::Synthetic)
            }
        };

        self.weather_cache.set(
            key,
            CachedPayload::Hourly(hours.clone()),
            self.ttls.for_kind(kind),
        );
        hours
    }

    /// 7-day outlook with air quality, else synthetic.
    pub async fn fetch_forecast(&self, coordinate: Coordinate) -> ForecastOutlook {
        let key = coordinate.cache_key("forecast");
        if let Some(CachedPayload::Outlook(outlook)) = self.weather_cache.get(&key) {
            return outlook;
        }

        let (outlook, kind) = match self
            .first_success(Capability::Daily, move |source| source.daily(coordinate))
            .await
        {
            Some(found) => found,
            None => {
                tracing::warn!("Using synthetic 7-day forecast");
                (self.synthetic.daily(self.clock.today()), SourceKind::Synthetic)
            }
        };

        self.weather_cache.set(
            key,
            CachedPayload::Outlook(outlook.clone()),
            self.ttls.for_kind(kind),
        );
        outlook
    }

    /// Answer a chat message: cache, then AI chat sources, then the local
    /// assistant. Never fails.
    pub async fn fetch_chat_reply(&self, message: &str, context: &WeatherContext) -> String {
        let message = sanitize_input(message, CHAT_MAX_CHARS);
        if message.is_empty() {
            return EMPTY_MESSAGE_REPLY.to_string();
        }

        let key = chat_cache_key(&context.city, &message);
        if let Some(CachedPayload::Chat(reply)) = self.weather_cache.get(&key) {
            tracing::info!("Using cached chat response");
            return reply;
        }

        for source in &self.chat_sources {
            let descriptor = source.descriptor();
            match self
                .attempt(descriptor, source.reply(&message, context))
                .await
            {
                Ok(reply) => {
                    self.weather_cache
                        .set(key, CachedPayload::Chat(reply.clone()), self.ttls.chat);
                    return reply;
                }
                Err(e) => tracing::debug!("{} chat failed: {}", descriptor.name, e),
            }
        }

        let reply = self.assistant.reply(&message, context);
        self.weather_cache.set(
            key,
            CachedPayload::Chat(reply.clone()),
            self.ttls.synthetic,
        );
        reply
    }

    /// Drop every cached weather, forecast, chat and location entry.
    pub fn clear_caches(&self) {
        self.weather_cache.clear();
        self.location_cache.clear();
        tracing::info!("Caches cleared");
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy",
            timestamp: self.clock.now(),
            service: format!("FlintWeather v{}", env!("CARGO_PKG_VERSION")),
            cache_stats: CacheSizes {
                weather: self.weather_cache.size(),
                location: self.location_cache.size(),
            },
            cache_counters: CacheCounters {
                weather: self.weather_cache.stats(),
                location: self.location_cache.stats(),
            },
            gemini_enabled: self.ai_enabled(),
            quota: self.quota.snapshot(),
        }
    }
}

/// Assembles a [`WeatherService`]. Trackers may be shared with other
/// services by passing the same `Arc`.
pub struct WeatherServiceBuilder {
    weather_sources: Vec<Arc<dyn WeatherSource>>,
    chat_sources: Vec<Arc<dyn ChatSource>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    cache_capacity: usize,
    ttls: CacheTtls,
    quota_limits: (usize, u32),
    quota: Option<Arc<QuotaTracker>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    clock: Arc<dyn Clock>,
    ai_enabled: bool,
}

impl Default for WeatherServiceBuilder {
    fn default() -> Self {
        let cache = CacheConfig::default();
        Self {
            weather_sources: Vec::new(),
            chat_sources: Vec::new(),
            geocoder: None,
            cache_capacity: cache.max_size,
            ttls: CacheTtls::from_config(&cache),
            quota_limits: (5, 150),
            quota: None,
            rate_limiter: None,
            clock: Arc::new(SystemClock),
            ai_enabled: true,
        }
    }
}

impl WeatherServiceBuilder {
    /// Append a source to the end of the chain.
    pub fn weather_source(mut self, source: Arc<dyn WeatherSource>) -> Self {
        self.weather_sources.push(source);
        self
    }

    pub fn chat_source(mut self, source: Arc<dyn ChatSource>) -> Self {
        self.chat_sources.push(source);
        self
    }

    pub fn geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    /// Ceilings for the tracker built when none is supplied.
    pub fn quota_limits(mut self, per_minute: usize, per_day: u32) -> Self {
        self.quota_limits = (per_minute, per_day);
        self
    }

    pub fn quota(mut self, quota: Arc<QuotaTracker>) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ai_enabled(mut self, enabled: bool) -> Self {
        self.ai_enabled = enabled;
        self
    }

    pub fn build(self) -> WeatherService {
        let (per_minute, per_day) = self.quota_limits;
        let quota = self.quota.unwrap_or_else(|| {
            Arc::new(QuotaTracker::with_clock(
                per_minute,
                per_day,
                self.clock.clone(),
            ))
        });

        WeatherService {
            weather_sources: self.weather_sources,
            chat_sources: self.chat_sources,
            geocoder: self.geocoder,
            synthetic: SyntheticWeather,
            assistant: LocalAssistant,
            weather_cache: TtlCache::with_clock(self.cache_capacity, self.clock.clone()),
            location_cache: TtlCache::with_clock(self.cache_capacity, self.clock.clone()),
            rate_limiter: self.rate_limiter.unwrap_or_default(),
            quota,
            ai_enabled: AtomicBool::new(self.ai_enabled),
            ttls: self.ttls,
            clock: self.clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sources::Capabilities;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use flint_core::QuotaReason;
    use std::sync::atomic::AtomicUsize;

    struct StubSource {
        descriptor: SourceDescriptor,
        outcome: Result<(), SourceError>,
        latency: Duration,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(name: &'static str, kind: SourceKind, outcome: Result<(), SourceError>) -> Arc<Self> {
            Self::paced(name, kind, outcome, None, Duration::ZERO)
        }

        /// A source with an upstream spacing requirement and a response delay.
        fn paced(
            name: &'static str,
            kind: SourceKind,
            outcome: Result<(), SourceError>,
            min_interval: Option<Duration>,
            latency: Duration,
        ) -> Arc<Self> {
            Arc::new(Self {
                descriptor: SourceDescriptor {
                    name,
                    kind,
                    capabilities: Capabilities::CURRENT_ONLY,
                    min_interval,
                    quota_limited: kind == SourceKind::Ai,
                },
                outcome,
                latency,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherSource for StubSource {
        fn descriptor(&self) -> &SourceDescriptor {
            &self.descriptor
        }

        async fn current(
            &self,
            _location: &LocationInfo,
        ) -> Result<crate::types::CurrentConditions, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.outcome.clone().map(|()| {
                crate::types::CurrentConditions::new(
                    self.descriptor.name,
                    self.descriptor.kind,
                    "Clear",
                    20.0,
                    20.0,
                    50,
                    5.0,
                )
            })
        }
    }

    struct StubChat {
        descriptor: SourceDescriptor,
        outcome: Result<String, SourceError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatSource for StubChat {
        fn descriptor(&self) -> &SourceDescriptor {
            &self.descriptor
        }

        async fn reply(&self, _message: &str, _context: &WeatherContext) -> Result<String, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn stub_chat(outcome: Result<String, SourceError>) -> Arc<StubChat> {
        Arc::new(StubChat {
            descriptor: SourceDescriptor {
                name: "stub_chat",
                kind: SourceKind::Ai,
                capabilities: Capabilities::default(),
                min_interval: None,
                quota_limited: true,
            },
            outcome,
            calls: AtomicUsize::new(0),
        })
    }

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap(),
        ))
    }

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[tokio::test]
    async fn test_first_success_wins_and_later_sources_untouched() {
        let ai = StubSource::new("ai", SourceKind::Ai, Err(SourceError::Timeout));
        let primary = StubSource::new("primary", SourceKind::Provider, Ok(()));
        let secondary = StubSource::new("secondary", SourceKind::Provider, Ok(()));
        let service = WeatherService::builder()
            .weather_source(ai.clone())
            .weather_source(primary.clone())
            .weather_source(secondary.clone())
            .build();

        let report = service.fetch_weather(coord(40.0, -74.0)).await;

        assert_eq!(report.source, "primary");
        assert!(report.is_real_data);
        assert_eq!(report.weather_tips[0], "From primary");
        assert_eq!((ai.calls(), primary.calls(), secondary.calls()), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_all_failing_falls_back_to_synthetic() {
        let primary = StubSource::new("primary", SourceKind::Provider, Err(SourceError::Timeout));
        let service = WeatherService::builder().weather_source(primary).build();

        let report = service.fetch_weather(coord(40.0, -74.0)).await;
        assert_eq!(report.source_kind, SourceKind::Synthetic);
        assert!(!report.is_real_data);
        assert_eq!(report.weather_tips[0], "Simulated data");
        assert_eq!(report.location.city, "Unknown");
    }

    #[tokio::test]
    async fn test_cache_hit_invokes_no_source() {
        let primary = StubSource::new("primary", SourceKind::Provider, Ok(()));
        let service = WeatherService::builder()
            .weather_source(primary.clone())
            .build();

        let first = service.fetch_weather(coord(40.0, -74.0)).await;
        let second = service.fetch_weather(coord(40.00001, -74.00001)).await;

        assert_eq!(first, second);
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_ttl_by_kind() {
        let clock = manual_clock();
        let ai = StubSource::new("ai", SourceKind::Ai, Ok(()));
        let service = WeatherService::builder()
            .clock(clock.clone())
            .weather_source(ai.clone())
            .build();

        service.fetch_weather(coord(1.0, 1.0)).await;
        clock.advance(chrono::Duration::seconds(1799));
        service.fetch_weather(coord(1.0, 1.0)).await;
        assert_eq!(ai.calls(), 1);

        clock.advance(chrono::Duration::seconds(1));
        service.fetch_weather(coord(1.0, 1.0)).await;
        assert_eq!(ai.calls(), 2);
    }

    #[tokio::test]
    async fn test_ai_rate_limit_disables_ai_for_good() {
        let ai = StubSource::new("ai", SourceKind::Ai, Err(SourceError::RateLimited));
        let primary = StubSource::new("primary", SourceKind::Provider, Ok(()));
        let service = WeatherService::builder()
            .weather_source(ai.clone())
            .weather_source(primary.clone())
            .build();

        service.fetch_weather(coord(10.0, 10.0)).await;
        assert!(!service.ai_enabled());

        service.fetch_weather(coord(20.0, 20.0)).await;
        assert_eq!(ai.calls(), 1);
        assert_eq!(primary.calls(), 2);
        assert!(!service.health().gemini_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ai_disabled_while_waiting_on_rate_limit_is_not_called() {
        let ai = StubSource::paced(
            "ai",
            SourceKind::Ai,
            Err(SourceError::RateLimited),
            Some(Duration::from_secs(10)),
            Duration::from_secs(1),
        );
        let primary = StubSource::new("primary", SourceKind::Provider, Ok(()));
        let service = WeatherService::builder()
            .weather_source(ai.clone())
            .weather_source(primary.clone())
            .build();

        // The second request reserves the next AI slot, then sleeps past the 429
        let (first, second) = tokio::join!(
            service.fetch_weather(coord(1.0, 1.0)),
            service.fetch_weather(coord(2.0, 2.0)),
        );

        assert!(!service.ai_enabled());
        assert_eq!(ai.calls(), 1);
        assert_eq!(primary.calls(), 2);
        assert_eq!(first.source, "primary");
        assert_eq!(second.source, "primary");
        assert_eq!(service.health().quota.daily_count, 1);
    }

    #[tokio::test]
    async fn test_provider_rate_limit_does_not_disable_ai() {
        let primary = StubSource::new("primary", SourceKind::Provider, Err(SourceError::RateLimited));
        let service = WeatherService::builder().weather_source(primary).build();

        service.fetch_weather(coord(10.0, 10.0)).await;
        assert!(service.ai_enabled());
    }

    #[tokio::test]
    async fn test_quota_denial_skips_ai_without_calling() {
        let ai = StubSource::new("ai", SourceKind::Ai, Ok(()));
        let service = WeatherService::builder()
            .quota_limits(0, 150)
            .weather_source(ai.clone())
            .build();

        let report = service.fetch_weather(coord(5.0, 5.0)).await;
        assert_eq!(ai.calls(), 0);
        assert_eq!(report.source_kind, SourceKind::Synthetic);
    }

    #[tokio::test]
    async fn test_quota_recorded_after_dispatch_only() {
        let clock = manual_clock();
        let quota = Arc::new(QuotaTracker::with_clock(2, 150, clock.clone()));
        let ai = StubSource::new("ai", SourceKind::Ai, Err(SourceError::Timeout));
        let primary = StubSource::new("primary", SourceKind::Provider, Ok(()));
        let service = WeatherService::builder()
            .clock(clock)
            .quota(quota.clone())
            .weather_source(ai.clone())
            .weather_source(primary)
            .build();

        service.fetch_weather(coord(1.0, 2.0)).await;
        service.fetch_weather(coord(3.0, 4.0)).await;
        assert_eq!(quota.snapshot().daily_count, 2);

        // Third distinct request is denied by the minute window
        service.fetch_weather(coord(5.0, 6.0)).await;
        assert_eq!(ai.calls(), 2);
        assert_eq!(
            quota.can_make_request(),
            QuotaDecision::Denied(QuotaReason::Minute)
        );
    }

    #[tokio::test]
    async fn test_disabled_builder_flag_skips_ai() {
        let ai = StubSource::new("ai", SourceKind::Ai, Ok(()));
        let service = WeatherService::builder()
            .ai_enabled(false)
            .weather_source(ai.clone())
            .build();

        service.fetch_weather(coord(5.0, 5.0)).await;
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn test_hourly_skips_current_only_sources() {
        let primary = StubSource::new("primary", SourceKind::Provider, Ok(()));
        let service = WeatherService::builder()
            .clock(manual_clock())
            .weather_source(primary.clone())
            .build();

        let hours = service.fetch_hourly(coord(40.0, -74.0)).await;
        assert_eq!(hours.len(), 24);
        assert_eq!(primary.calls(), 0);

        // Cached
        let again = service.fetch_hourly(coord(40.0, -74.0)).await;
        assert_eq!(hours, again);
    }

    #[tokio::test]
    async fn test_forecast_synthetic_uses_clock_date() {
        let service = WeatherService::builder().clock(manual_clock()).build();
        let outlook = service.fetch_forecast(coord(40.0, -74.0)).await;
        assert_eq!(outlook.forecast.len(), 7);
        assert_eq!(outlook.forecast[0].date, "2026-06-10");
    }

    #[tokio::test]
    async fn test_chat_empty_message() {
        let service = WeatherService::builder().build();
        let reply = service
            .fetch_chat_reply("  <>  ", &WeatherContext::default())
            .await;
        assert_eq!(reply, EMPTY_MESSAGE_REPLY);
    }

    #[tokio::test]
    async fn test_chat_ai_reply_is_cached() {
        let chat = stub_chat(Ok("Sunny all day.".to_string()));
        let service = WeatherService::builder().chat_source(chat.clone()).build();
        let ctx = WeatherContext::default();

        assert_eq!(service.fetch_chat_reply("Forecast?", &ctx).await, "Sunny all day.");
        assert_eq!(service.fetch_chat_reply("Forecast?", &ctx).await, "Sunny all day.");
        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chat_falls_back_to_local_assistant() {
        let chat = stub_chat(Err(SourceError::RateLimited));
        let service = WeatherService::builder().chat_source(chat.clone()).build();
        let ctx = WeatherContext {
            city: "Lyon".to_string(),
            ..WeatherContext::default()
        };

        let reply = service.fetch_chat_reply("who are you", &ctx).await;
        assert!(reply.contains("FlintWeather"));
        assert!(!service.ai_enabled());

        // AI now disabled; a new question never reaches it
        service.fetch_chat_reply("is it windy", &ctx).await;
        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_caches_forces_refetch() {
        let primary = StubSource::new("primary", SourceKind::Provider, Ok(()));
        let service = WeatherService::builder()
            .weather_source(primary.clone())
            .build();

        service.fetch_weather(coord(40.0, -74.0)).await;
        service.clear_caches();
        assert_eq!(service.health().cache_stats.weather, 0);

        service.fetch_weather(coord(40.0, -74.0)).await;
        assert_eq!(primary.calls(), 2);
    }

    #[tokio::test]
    async fn test_health_reports_counters() {
        let service = WeatherService::builder().clock(manual_clock()).build();
        service.fetch_weather(coord(40.0, -74.0)).await;

        let health = service.health();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.cache_stats.weather, 1);
        assert_eq!(health.cache_counters.weather.misses, 1);
        assert_eq!(health.cache_counters.weather.sets, 1);
        assert!(health.service.starts_with("FlintWeather v"));
    }

    #[tokio::test]
    async fn test_search_without_geocoder_or_query_is_empty() {
        let service = WeatherService::builder().build();
        assert!(service.search_locations("Paris").await.is_empty());
        assert!(service.search_locations("<>").await.is_empty());
    }

    #[test]
    fn test_ttls_for_kind() {
        let ttls = CacheTtls::default();
        assert_eq!(ttls.for_kind(SourceKind::Ai), Duration::from_secs(1800));
        assert_eq!(ttls.for_kind(SourceKind::Provider), Duration::from_secs(3600));
        assert_eq!(ttls.for_kind(SourceKind::Synthetic), Duration::from_secs(1800));
        assert_eq!(ttls.chat, Duration::from_secs(7200));
    }

    #[test]
    fn test_from_config_without_keys_has_no_ai() {
        let service = WeatherService::from_config(&Config::default()).unwrap();
        assert!(!service.ai_enabled());
        assert!(service.chat_sources.is_empty());
        // Open-Meteo only
        assert_eq!(service.weather_sources.len(), 1);
    }
}

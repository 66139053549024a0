//! API endpoint handlers

use axum::{extract::State, Json};
use flint_core::ValidationError;
use flint_weather::{
    sanitize_input, ForecastOutlook, HealthReport, LocationInfo, WeatherContext, WeatherReport,
    SEARCH_MAX_CHARS,
};

use super::extractors::JsonExtractor;
use super::types::*;
use crate::error::ServerError;

pub(super) const NO_WEATHER_DATA_REPLY: &str = "Please load weather data first!";

pub(super) async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.service.health())
}

pub(super) async fn reverse_geocode(
    State(state): State<AppState>,
    JsonExtractor(payload): JsonExtractor<CoordinatesPayload>,
) -> Result<Json<LocationInfo>, ServerError> {
    let coordinate = payload.coordinate()?;
    state
        .service
        .fetch_location(coordinate)
        .await
        .map(Json)
        .ok_or_else(|| ServerError::BadRequest("Location failed".to_string()))
}

pub(super) async fn search_location(
    State(state): State<AppState>,
    JsonExtractor(payload): JsonExtractor<SearchRequest>,
) -> Result<Json<SearchResponse>, ServerError> {
    if sanitize_input(&payload.query, SEARCH_MAX_CHARS).is_empty() {
        return Err(ValidationError::MissingField("query").into());
    }

    let results = state.service.search_locations(&payload.query).await;
    tracing::info!("Search returned {} results", results.len());
    Ok(Json(SearchResponse { results }))
}

pub(super) async fn weather(
    State(state): State<AppState>,
    JsonExtractor(payload): JsonExtractor<CoordinatesPayload>,
) -> Result<Json<WeatherReport>, ServerError> {
    let coordinate = payload.coordinate()?;
    Ok(Json(state.service.fetch_weather(coordinate).await))
}

pub(super) async fn hourly(
    State(state): State<AppState>,
    JsonExtractor(payload): JsonExtractor<CoordinatesPayload>,
) -> Result<Json<HourlyResponse>, ServerError> {
    let coordinate = payload.coordinate()?;
    let hourly_forecast = state.service.fetch_hourly(coordinate).await;
    Ok(Json(HourlyResponse { hourly_forecast }))
}

pub(super) async fn forecast(
    State(state): State<AppState>,
    JsonExtractor(payload): JsonExtractor<CoordinatesPayload>,
) -> Result<Json<ForecastOutlook>, ServerError> {
    let coordinate = payload.coordinate()?;
    Ok(Json(state.service.fetch_forecast(coordinate).await))
}

pub(super) async fn chatbot(
    State(state): State<AppState>,
    JsonExtractor(payload): JsonExtractor<ChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(ValidationError::MissingField("message").into());
    }

    let response = match WeatherContext::from_json(&payload.weather_data) {
        Some(context) => state.service.fetch_chat_reply(message, &context).await,
        None => NO_WEATHER_DATA_REPLY.to_string(),
    };
    Ok(Json(ChatResponse { response }))
}

pub(super) async fn cache_clear(State(state): State<AppState>) -> Json<MessageResponse> {
    state.service.clear_caches();
    Json(MessageResponse {
        message: "Cache cleared".to_string(),
    })
}

pub(super) async fn not_found() -> ServerError {
    ServerError::NotFound("Not found".to_string())
}

//! Router creation and configuration

use std::path::Path;
use std::sync::Arc;

use axum::{
    handler::HandlerWithoutStateExt,
    routing::{get, post},
    Router,
};
use flint_weather::WeatherService;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers::*;
use super::types::AppState;

/// Create the API router. Paths outside the route table are served from
/// `static_dir`; anything not found there gets a JSON 404.
pub fn create_router(service: Arc<WeatherService>, static_dir: impl AsRef<Path>) -> Router {
    let state = AppState { service };

    let static_files = ServeDir::new(static_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(not_found.into_service());

    Router::new()
        .route("/health", get(health))
        .route("/api/reverse-geocode", post(reverse_geocode))
        .route("/api/search-location", post(search_location))
        .route("/api/weather", post(weather))
        .route("/api/hourly", post(hourly))
        .route("/api/forecast", post(forecast))
        .route("/api/chatbot", post(chatbot))
        .route("/api/cache-clear", post(cache_clear))
        .fallback_service(static_files)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

//! HTTP surface for FlintWeather
//!
//! JSON routes over a shared [`flint_weather::WeatherService`], plus the
//! static front-end as the fallback service.

pub mod api;
pub mod error;

pub use api::{create_router, AppState};
pub use error::ServerError;

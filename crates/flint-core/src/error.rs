//! Centralized error types for FlintWeather.
//!
//! Client mistakes (validation) are kept apart from upstream trouble
//! (sources): the former become 400 responses, the latter are recovered by
//! the fallback chain and only ever logged.

use std::fmt;

use thiserror::Error;

/// Bad input from the request layer. Surfaced as a client error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("{0} required")]
    MissingField(&'static str),
}

impl ValidationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::InvalidCoordinates { .. } => "Invalid coordinates",
            ValidationError::MissingField("message") => "Message required",
            ValidationError::MissingField("query") => "Query required",
            ValidationError::MissingField(_) => "Missing required field",
        }
    }
}

/// Which quota ceiling denied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaReason {
    Minute,
    Daily,
}

impl QuotaReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaReason::Minute => "minute",
            QuotaReason::Daily => "daily",
        }
    }
}

impl fmt::Display for QuotaReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single upstream data source.
///
/// The fallback chain recovers from every variant by moving on to the next
/// source; only `RateLimited` from the AI source has a lasting effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("Connection failed: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Upstream rate limit hit")]
    RateLimited,

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Quota exceeded ({0})")]
    QuotaExceeded(QuotaReason),

    #[error("Source disabled")]
    Disabled,

    #[error("Operation not supported by this source")]
    Unsupported,
}

impl SourceError {
    /// Build an error from a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == 429 {
            SourceError::RateLimited
        } else {
            SourceError::Status {
                status,
                message: message.into(),
            }
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_source_error(self) -> SourceError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_source_error(self) -> SourceError {
        if self.is_timeout() {
            SourceError::Timeout
        } else if self.is_decode() {
            SourceError::Malformed(self.to_string())
        } else if let Some(status) = self.status() {
            SourceError::from_status(status.as_u16(), self.to_string())
        } else {
            SourceError::Network(self.to_string())
        }
    }
}

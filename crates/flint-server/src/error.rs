//! Server error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use flint_core::ValidationError;
use serde_json::json;
use thiserror::Error;

/// Errors a route handler can return. Each maps to a JSON body of
/// `{error, status}`.
///
/// Upstream failures never reach this type: the weather service recovers
/// from them with cached or synthetic data.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::debug!("Request rejected with {}: {}", status, self);

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<ValidationError> for ServerError {
    fn from(err: ValidationError) -> Self {
        ServerError::BadRequest(err.user_message().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: ServerError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_bad_request_body() {
        let (status, body) = body_json(ServerError::BadRequest("Query required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Query required", "status": 400}));
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let (status, body) = body_json(ServerError::NotFound("Not found".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Not found", "status": 404}));
    }

    #[test]
    fn test_validation_error_uses_user_message() {
        let err: ServerError = ValidationError::InvalidCoordinates {
            latitude: 91.0,
            longitude: 0.0,
        }
        .into();
        assert!(matches!(&err, ServerError::BadRequest(m) if m == "Invalid coordinates"));

        let err: ServerError = ValidationError::MissingField("message").into();
        assert_eq!(err.to_string(), "Message required");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}

//! REST error envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Error body in the portal's format.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code; empty for missing records.
    pub error: String,
    /// Error description.
    pub error_description: String,
}

/// REST method errors.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Unknown REST method.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Webhook token mismatch.
    #[error("Invalid request credentials")]
    InvalidCredentials,

    /// Record does not exist.
    #[error("Not found")]
    NotFound,

    /// Missing or malformed parameter.
    #[error("{0}")]
    Argument(String),
}

impl RestError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            RestError::MethodNotFound(_) => (StatusCode::BAD_REQUEST, "ERROR_METHOD_NOT_FOUND"),
            RestError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            RestError::NotFound => (StatusCode::BAD_REQUEST, ""),
            RestError::Argument(_) => (StatusCode::BAD_REQUEST, "ERROR_ARGUMENT"),
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = Json(ErrorResponse {
            error: code.to_string(),
            error_description: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_has_empty_code() {
        let (status, code) = RestError::NotFound.status_and_code();

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "");
        assert_eq!(RestError::NotFound.to_string(), "Not found");
    }

    #[test]
    fn test_credentials_are_unauthorized() {
        let (status, code) = RestError::InvalidCredentials.status_and_code();

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(code, "INVALID_CREDENTIALS");
    }

    #[test]
    fn test_method_not_found_message() {
        let err = RestError::MethodNotFound("crm.lead.add".to_string());

        assert_eq!(err.status_and_code().1, "ERROR_METHOD_NOT_FOUND");
        assert!(err.to_string().contains("crm.lead.add"));
    }
}

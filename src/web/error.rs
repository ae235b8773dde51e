//! API error handling for the Jotter web API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::JotterError;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Invalid folder move (400).
    InvalidMove,
    /// Unauthorized (401).
    Unauthorized,
    /// Forbidden (403).
    Forbidden,
    /// Not found (404).
    NotFound,
    /// Conflict (409).
    Conflict,
    /// Storage quota exceeded (413).
    StorageLimitExceeded,
    /// Validation error (422) - for field-level validation errors.
    ValidationError,
    /// Unprocessable entity (422).
    UnprocessableEntity,
    /// PIN must be set first (428).
    PinRequired,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest | ErrorCode::InvalidMove => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::StorageLimitExceeded => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::PinRequired => StatusCode::PRECONDITION_REQUIRED,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured details (field errors, quota numbers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<Value>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with details.
    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    /// Error code of this error.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a validation error with field-level details.
    pub fn validation(details: HashMap<String, Vec<String>>) -> Self {
        Self::with_details(ErrorCode::ValidationError, "Validation failed", json!(details))
    }

    /// Create a validation error from validator::ValidationErrors.
    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let mut details: HashMap<String, Vec<String>> = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {}", field))
                })
                .collect();
            details.insert(field.to_string(), messages);
        }

        Self::validation(details)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<JotterError> for ApiError {
    fn from(err: JotterError) -> Self {
        match err {
            JotterError::Auth(msg) => ApiError::new(ErrorCode::Unauthorized, msg),
            JotterError::Forbidden(msg) => ApiError::new(ErrorCode::Forbidden, msg),
            JotterError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            JotterError::Conflict(msg) => ApiError::new(ErrorCode::Conflict, msg),
            JotterError::Validation(msg) => ApiError::new(ErrorCode::UnprocessableEntity, msg),
            JotterError::InvalidMove(msg) => ApiError::new(ErrorCode::InvalidMove, msg),
            JotterError::PinRequired => ApiError::new(
                ErrorCode::PinRequired,
                "A PIN must be set before using the private space",
            ),
            JotterError::StorageLimitExceeded {
                requested,
                available,
            } => ApiError::with_details(
                ErrorCode::StorageLimitExceeded,
                "Storage limit exceeded",
                json!({ "requested": requested, "available": available }),
            ),
            other => {
                tracing::error!("Internal error: {}", other);
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status() {
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidMove.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::StorageLimitExceeded.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ErrorCode::PinRequired.status_code(),
            StatusCode::PRECONDITION_REQUIRED
        );
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_from_jotter_error() {
        let cases = [
            (JotterError::NotFound("folder".into()), ErrorCode::NotFound),
            (JotterError::Forbidden("x".into()), ErrorCode::Forbidden),
            (JotterError::Conflict("x".into()), ErrorCode::Conflict),
            (JotterError::InvalidMove("x".into()), ErrorCode::InvalidMove),
            (JotterError::PinRequired, ErrorCode::PinRequired),
            (JotterError::Validation("x".into()), ErrorCode::UnprocessableEntity),
            (JotterError::Auth("x".into()), ErrorCode::Unauthorized),
            (JotterError::Database("boom".into()), ErrorCode::InternalError),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError::from(err).code(), code);
        }
    }

    #[test]
    fn test_storage_limit_details() {
        let err = ApiError::from(JotterError::StorageLimitExceeded {
            requested: 200,
            available: 100,
        });
        assert_eq!(err.code, ErrorCode::StorageLimitExceeded);
        assert_eq!(err.details, Some(json!({ "requested": 200, "available": 100 })));
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = ApiError::from(JotterError::Database("secret table".into()));
        assert_eq!(err.message, "An internal error occurred");
    }

    #[test]
    fn test_validation_error() {
        let mut details = HashMap::new();
        details.insert("name".to_string(), vec!["Too long".to_string()]);

        let err = ApiError::validation(details);
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "Validation failed");
        assert_eq!(err.details, Some(json!({ "name": ["Too long"] })));
    }
}

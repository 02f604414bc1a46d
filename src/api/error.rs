//! Unified error responses for the HTTP layer.
//!
//! Engine and store outcomes are converted into [`ApiError`], which renders a
//! JSON envelope `{"error": {"code", "message", "details"?}}`. The one
//! exception is a missing login, which browsers follow as a redirect.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::engine::{EngineError, FieldErrors};
use crate::store::StoreError;

/// Where unauthenticated browsers are sent
pub const LOGIN_PATH: &str = "/login";

/// Error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Client errors (4xx)
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    InvalidTransition,
    ValidationError,

    // Server errors (5xx)
    InternalError,
    ServiceUnavailable,
    DatabaseError,
}

impl ErrorCode {
    /// Get the default HTTP status code for this error code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::InvalidTransition => StatusCode::CONFLICT,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::InvalidTransition => "invalid_transition",
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::ServiceUnavailable => "service_unavailable",
            ErrorCode::DatabaseError => "database_error",
        }
    }
}

/// The inner error object in the response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetails {
    /// Field-level validation errors
    ValidationErrors(HashMap<String, Vec<String>>),
    /// Generic key-value details
    Generic(HashMap<String, serde_json::Value>),
}

/// The full error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    status: StatusCode,
    message: String,
    details: Option<ErrorDetails>,
    /// Answer with a redirect to the login page instead of a JSON body
    login_redirect: bool,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.status_code(),
            code,
            message: message.into(),
            details: None,
            login_redirect: false,
        }
    }

    /// Create an API error with a custom HTTP status code
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = Some(details);
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    // -------------------------------------------------------------------------
    // Convenience constructors
    // -------------------------------------------------------------------------

    /// Bad request error (400)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Unauthorized error (401) for non-browser callers
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Send the browser to the login page (303)
    pub fn login_required() -> Self {
        Self {
            login_redirect: true,
            ..Self::new(ErrorCode::Unauthorized, "Authentication required")
        }
    }

    /// Forbidden error (403) - authenticated but not allowed
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Not found error (404)
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Conflict error (409) - resource already exists
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Validation error (400) with field-level details
    pub fn validation(errors: FieldErrors) -> Self {
        let message = if errors.len() == 1 {
            errors
                .values()
                .next()
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string())
        } else {
            format!("Validation failed for {} fields", errors.len())
        };

        Self::new(ErrorCode::ValidationError, message)
            .with_details(ErrorDetails::ValidationErrors(errors))
    }

    /// Internal server error (500)
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error (500)
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Service unavailable error (503)
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Convert an engine outcome. With `conceal_forbidden`, an ownership
    /// failure is indistinguishable from a missing item.
    pub fn from_engine(err: EngineError, conceal_forbidden: bool) -> Self {
        match err {
            EngineError::Validation(errors) => ApiError::validation(errors),
            EngineError::NotFound(_) => ApiError::not_found("Item not found"),
            EngineError::Forbidden(_) if conceal_forbidden => ApiError::not_found("Item not found"),
            EngineError::Forbidden(_) => {
                ApiError::forbidden("You are not allowed to modify this item")
            }
            EngineError::InvalidTransition { id, status } => {
                let mut details = HashMap::new();
                details.insert("id".to_string(), serde_json::json!(id));
                details.insert("status".to_string(), serde_json::json!(status));
                ApiError::new(
                    ErrorCode::InvalidTransition,
                    format!("Item is already {}", status),
                )
                .with_details(ErrorDetails::Generic(details))
            }
            EngineError::Unauthenticated => ApiError::login_required(),
            EngineError::Timeout(_) => {
                ApiError::service_unavailable("Storage did not respond in time")
            }
            EngineError::Storage(e) => ApiError::from(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.login_redirect {
            return Redirect::to(LOGIN_PATH).into_response();
        }

        let response = ErrorResponse {
            error: ErrorBody {
                code: self.code.as_str().to_string(),
                message: self.message,
                details: self.details,
            },
        };

        (self.status, Json(response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::not_found("Resource not found"),
            StoreError::Conflict(_) => {
                ApiError::conflict("A resource with this identifier already exists")
            }
            StoreError::Attachment(e) => {
                tracing::error!(error = %e, "Failed to store upload");
                ApiError::internal("Failed to store the uploaded file")
            }
            other => {
                tracing::error!(error = %other, "Storage error");
                ApiError::database("A database error occurred")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ItemStatus;
    use axum::http::header;
    use std::time::Duration;

    #[test]
    fn test_error_code_status_codes() {
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::InvalidTransition.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_validation_error_single_field() {
        let mut errors = HashMap::new();
        errors.insert("title".to_string(), vec!["Title is required".to_string()]);
        let err = ApiError::validation(errors);
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "Title is required");
    }

    #[test]
    fn test_validation_error_multiple_fields() {
        let mut errors = HashMap::new();
        errors.insert("title".to_string(), vec!["Title is required".to_string()]);
        errors.insert("contact".to_string(), vec!["Contact is required".to_string()]);

        let err = ApiError::validation(errors);
        assert!(err.message.contains("2 fields"));
        match &err.details {
            Some(ErrorDetails::ValidationErrors(fields)) => assert_eq!(fields.len(), 2),
            other => panic!("expected validation details, got {:?}", other),
        }
    }

    #[test]
    fn test_engine_outcomes_map_to_status() {
        let cases = [
            (EngineError::NotFound(1), StatusCode::NOT_FOUND),
            (EngineError::Forbidden(1), StatusCode::FORBIDDEN),
            (
                EngineError::InvalidTransition {
                    id: 1,
                    status: ItemStatus::Found,
                },
                StatusCode::CONFLICT,
            ),
            (
                EngineError::Timeout(Duration::from_secs(5)),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                EngineError::Storage(StoreError::Corrupt("bad".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from_engine(err, false).status(), status);
        }
    }

    #[test]
    fn test_forbidden_can_be_concealed() {
        let err = ApiError::from_engine(EngineError::Forbidden(3), true);
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unauthenticated_redirects_to_login() {
        let response = ApiError::from_engine(EngineError::Unauthenticated, false).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], LOGIN_PATH);
    }

    #[test]
    fn test_store_conflict() {
        let err = ApiError::from(StoreError::Conflict("users.username".into()));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}

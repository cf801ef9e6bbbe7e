// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::services::ServiceError;
use crate::validation::FieldErrors;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<BTreeMap<String, String>>,
    },
    InvalidJson(String),
    AlreadyExists(String),
    DomainConfiguration(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),
    TrustNotFound(String),

    // 429 Too Many Requests
    TooManyRequests(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_)
            | ApiError::ValidationError { .. }
            | ApiError::InvalidJson(_)
            | ApiError::AlreadyExists(_)
            | ApiError::DomainConfiguration(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::TrustNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::InvalidJson(msg)
            | ApiError::AlreadyExists(msg)
            | ApiError::DomainConfiguration(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::TrustNotFound(msg)
            | ApiError::TooManyRequests(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
        }
    }

    /// Error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::AlreadyExists(_) => "ALREADY_EXISTS",
            ApiError::DomainConfiguration(_) => "DOMAIN_CONFIGURATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::TrustNotFound(_) => "TRUST_NOT_FOUND",
            ApiError::TooManyRequests(_) => "TOO_MANY_REQUESTS",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Error envelope: `{ success: false, error: { code, message, details? } }`.
    /// Internal messages are hidden when `hide_internal` is set.
    pub fn to_json(&self, hide_internal: bool) -> Value {
        let message = match self {
            ApiError::InternalServerError(_) if hide_internal => "Internal server error",
            _ => self.message(),
        };

        let mut error = json!({
            "code": self.error_code(),
            "message": message,
        });
        if let ApiError::ValidationError { field_errors: Some(field_errors), .. } = self {
            error["details"] = json!(field_errors);
        }

        json!({ "success": false, "error": error })
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<BTreeMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn domain_configuration(message: impl Into<String>) -> Self {
        ApiError::DomainConfiguration(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn trust_not_found(message: impl Into<String>) -> Self {
        ApiError::TrustNotFound(message.into())
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        ApiError::TooManyRequests(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::validation_error("Validation failed", Some(errors.into_inner()))
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(errors) => errors.into(),
            ServiceError::AlreadyExists(msg) => ApiError::AlreadyExists(msg),
            ServiceError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            ServiceError::InvalidState(msg) | ServiceError::BusinessRule(msg) => ApiError::bad_request(msg),
            ServiceError::Unauthorized(msg) => ApiError::unauthorized(msg),
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ServiceError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ApiError::internal_server_error(msg)
            }
            ServiceError::Database(e) => e.into(),
        }
    }
}

impl From<crate::database::DatabaseError> for ApiError {
    fn from(err: crate::database::DatabaseError) -> Self {
        use crate::database::DatabaseError;
        match err {
            DatabaseError::TrustNotFound(id) => {
                ApiError::trust_not_found(format!("Trust {} not found or inactive", id))
            }
            DatabaseError::Connection(msg) => {
                tracing::error!("Database connection error: {}", msg);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Migration(e) => {
                tracing::error!("Migration error: {}", e);
                ApiError::internal_server_error(format!("Migration failed: {}", e))
            }
            other => {
                // Production responses replace this message, see `to_json`
                tracing::error!("Database error: {}", other);
                ApiError::internal_server_error(other.to_string())
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let hide_internal = crate::config::config().is_production();
        (self.status_code(), Json(self.to_json(hide_internal))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_carries_field_details() {
        let mut errors = FieldErrors::new();
        errors.add("trust_code", "is required");
        let api: ApiError = ServiceError::Validation(errors).into();

        assert_eq!(api.status_code(), StatusCode::BAD_REQUEST);
        let body = api.to_json(false);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["trust_code"], "is required");
    }

    #[test]
    fn already_exists_maps_to_bad_request() {
        let api: ApiError = ServiceError::AlreadyExists("Trust code already exists".into()).into();
        assert_eq!(api.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(api.error_code(), "ALREADY_EXISTS");
    }

    #[test]
    fn internal_message_hidden_when_requested() {
        let api = ApiError::internal_server_error("Table 'students' doesn't exist");
        assert_eq!(api.to_json(true)["error"]["message"], "Internal server error");
        assert_eq!(api.to_json(false)["error"]["message"], "Table 'students' doesn't exist");
    }

    #[test]
    fn trust_lookup_failure_is_not_found() {
        let api: ApiError = crate::database::DatabaseError::TrustNotFound(7).into();
        assert_eq!(api.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(api.error_code(), "TRUST_NOT_FOUND");
    }
}

pub mod attendance_service;
pub mod audit;
pub mod auth_service;
pub mod communication_service;
pub mod dashboard_service;
pub mod fee_service;
pub mod onboarding_service;
pub mod report_service;
pub mod student_service;
pub mod trust_service;
pub mod user_service;

use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::database::DatabaseError;
use crate::validation::FieldErrors;
use crate::wizard::WizardError;

/// Typed failure kinds raised by services. Handlers map these to HTTP
/// statuses without looking at message text.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    BusinessRule(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// One page of a filtered listing.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, limit: i64, offset: i64) -> Self {
        Self {
            items,
            total,
            page: offset / limit + 1,
            limit,
        }
    }
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        ServiceError::AlreadyExists(message.into())
    }

    pub fn business_rule(message: impl Into<String>) -> Self {
        ServiceError::BusinessRule(message.into())
    }

    /// Single-field validation failure.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        ServiceError::Validation(errors)
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(DatabaseError::Sqlx(err))
    }
}

impl From<FieldErrors> for ServiceError {
    fn from(errors: FieldErrors) -> Self {
        ServiceError::Validation(errors)
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken(msg) => ServiceError::Unauthorized(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<WizardError> for ServiceError {
    fn from(err: WizardError) -> Self {
        match err {
            WizardError::UnknownStep(_) => ServiceError::not_found("Wizard step"),
            WizardError::Validation(errors) => ServiceError::Validation(errors),
            WizardError::PayloadMismatch { expected, .. } => {
                ServiceError::invalid_field("step", format!("payload does not belong to step '{}'", expected))
            }
            other @ (WizardError::StepNotAccessible { .. } | WizardError::AlreadyComplete) => {
                ServiceError::InvalidState(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_follow_offset() {
        let page: Page<i32> = Page::new(vec![1, 2], 42, 20, 40);
        assert_eq!(page.page, 3);
        assert_eq!(page.total, 42);
    }

    #[test]
    fn auth_token_errors_become_unauthorized() {
        let err: ServiceError = AuthError::InvalidToken("expired".into()).into();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        let err: ServiceError = AuthError::MissingSecret.into();
        assert!(matches!(err, ServiceError::Internal(_)));
    }
}

//! Request validation: itemized field errors and the `ValidJson` extractor.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ApiError;

/// Field name → message, reported to clients as `error.details`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for `field`. The first message for a field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Fold in another validator's errors, each field name prefixed.
    pub fn merge(&mut self, prefix: &str, other: FieldErrors) {
        for (field, message) in other.0 {
            self.add(format!("{}{}", prefix, field), message);
        }
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn required(&mut self, field: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add(field, "is required");
            return false;
        }
        true
    }

    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.trim().chars().count();
        if len < min {
            self.add(field, format!("must be at least {} characters", min));
        } else if len > max {
            self.add(field, format!("must be at most {} characters", max));
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if !is_email(value) {
            self.add(field, "must be a valid email address");
        }
    }

    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) {
        if !allowed.contains(&value) {
            self.add(field, format!("must be one of: {}", allowed.join(", ")));
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{} {}", k, v)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Request bodies implement this to be accepted by [`ValidJson`].
pub trait Validate {
    fn validate(&self) -> Result<(), FieldErrors>;
}

/// Free-form bodies whose shape is checked by the service that consumes them.
impl Validate for serde_json::Value {
    fn validate(&self) -> Result<(), FieldErrors> {
        Ok(())
    }
}

impl Validate for serde_json::Map<String, serde_json::Value> {
    fn validate(&self) -> Result<(), FieldErrors> {
        Ok(())
    }
}

pub fn is_email(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Lowercase letters, digits and hyphens; no leading or trailing hyphen.
pub fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && !value.ends_with('-')
        && value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Uppercase letters, digits and underscores.
pub fn is_code(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// `YYYY-YYYY` where the second year follows the first, e.g. `2025-2026`.
pub fn is_academic_year(value: &str) -> bool {
    match value.split_once('-') {
        Some((start, end)) if start.len() == 4 && end.len() == 4 => {
            match (start.parse::<u16>(), end.parse::<u16>()) {
                (Ok(s), Ok(e)) => s.checked_add(1) == Some(e),
                _ => false,
            }
        }
        _ => false,
    }
}

/// JSON body extractor that rejects malformed input with the API error envelope
/// and runs [`Validate`] before the handler sees the payload.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::invalid_json(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = FieldErrors::new();
        errors.required("name", "  ");
        errors.length("name", "", 2, 10);
        assert_eq!(errors.clone().into_inner()["name"], "is required");
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn email_shape() {
        assert!(is_email("admin@school.edu"));
        assert!(!is_email("admin@school"));
        assert!(!is_email("@school.edu"));
        assert!(!is_email("ad min@school.edu"));
    }

    #[test]
    fn slug_and_code_shapes() {
        assert!(is_slug("dev-trust"));
        assert!(!is_slug("-dev"));
        assert!(!is_slug("Dev"));
        assert!(is_code("DEV_01"));
        assert!(!is_code("dev"));
    }

    #[test]
    fn academic_year_must_be_consecutive() {
        assert!(is_academic_year("2025-2026"));
        assert!(!is_academic_year("2025-2027"));
        assert!(!is_academic_year("25-26"));
    }
}

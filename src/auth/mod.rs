pub mod policy;
pub mod role;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config;
pub use role::Role;

/// Which database the token's subject lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    System,
    Trust,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub name: String,
    pub role: Role,
    pub scope: TokenScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_id: Option<i64>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn system(user_id: i64, username: String, role: Role) -> Self {
        Self::new(user_id, username, role, TokenScope::System, None)
    }

    pub fn trust(user_id: i64, email: String, role: Role, trust_id: i64) -> Self {
        Self::new(user_id, email, role, TokenScope::Trust, Some(trust_id))
    }

    fn new(sub: i64, name: String, role: Role, scope: TokenScope, trust_id: Option<i64>) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        Self {
            sub,
            name,
            role,
            scope,
            trust_id,
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT secret not configured")]
    MissingSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

pub fn generate_jwt(claims: &Claims) -> Result<String, AuthError> {
    encode_token(claims, &config::config().security.jwt_secret)
}

pub fn validate_jwt(token: &str) -> Result<Claims, AuthError> {
    decode_token(token, &config::config().security.jwt_secret)
}

/// bcrypt on the blocking pool; hashing is deliberately slow.
pub async fn hash_password(password: String) -> Result<String, AuthError> {
    let cost = config::config().security.bcrypt_cost;
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Token portion of a `Bearer <token>` header value.
pub fn extract_bearer_token(auth_header: &str) -> Result<&str, &'static str> {
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or("Authorization header must use Bearer token format")?
        .trim();
    if token.is_empty() {
        return Err("Empty bearer token");
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_keeps_trust_scope() {
        let claims = Claims::trust(12, "teacher@gvt.edu".into(), Role::Teacher, 4);
        let token = encode_token(&claims, "secret").unwrap();
        let decoded = decode_token(&token, "secret").unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.scope, TokenScope::Trust);
    }

    #[test]
    fn wrong_secret_or_missing_secret_rejected() {
        let claims = Claims::system(1, "root".into(), Role::SystemAdmin);
        let token = encode_token(&claims, "secret").unwrap();
        assert!(matches!(decode_token(&token, "other"), Err(AuthError::InvalidToken(_))));
        assert!(matches!(encode_token(&claims, ""), Err(AuthError::MissingSecret)));
    }

    #[test]
    fn expired_token_rejected() {
        let mut claims = Claims::system(1, "root".into(), Role::SystemAdmin);
        claims.exp = Utc::now().timestamp() - 3600;
        let token = encode_token(&claims, "secret").unwrap();
        assert!(decode_token(&token, "secret").is_err());
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(extract_bearer_token("Bearer abc.def").unwrap(), "abc.def");
        assert!(extract_bearer_token("Basic abc").is_err());
        assert!(extract_bearer_token("Bearer   ").is_err());
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hash = hash_password("s3cret-pass".into()).await.unwrap();
        assert!(verify_password("s3cret-pass".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".into(), hash).await.unwrap());
    }
}

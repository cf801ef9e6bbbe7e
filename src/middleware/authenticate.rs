use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{extract_bearer_token, validate_jwt, Claims, TokenScope};
use crate::error::ApiError;
use crate::tenant::TrustContext;

/// Authenticated caller, available to handlers as an extension.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub claims: Claims,
}

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.claims.sub
    }
}

/// Validate the bearer token. On tenant routes this runs after trust
/// resolution, and a trust-scoped token must belong to the resolved trust.
pub async fn authenticate_middleware(mut request: Request, next: Next) -> Response {
    match authenticate(&request) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(error) => error.into_response(),
    }
}

fn authenticate(request: &Request) -> Result<AuthUser, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Authorization header required"))?;

    let token = extract_bearer_token(header).map_err(ApiError::unauthorized)?;
    let claims = validate_jwt(token).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        ApiError::unauthorized("Invalid or expired token")
    })?;

    if let Some(context) = request.extensions().get::<TrustContext>() {
        match claims.scope {
            TokenScope::Trust if claims.trust_id != Some(context.trust_id) => {
                tracing::warn!(
                    "Token for trust {:?} used on trust {} by user {}",
                    claims.trust_id,
                    context.trust_id,
                    claims.sub
                );
                return Err(ApiError::unauthorized("Token is not valid for this trust"));
            }
            TokenScope::System => {
                return Err(ApiError::unauthorized("System tokens cannot access trust routes"));
            }
            _ => {}
        }
    }

    Ok(AuthUser { claims })
}

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AuthUser;
use crate::auth::policy::{authorize, Decision};
use crate::error::ApiError;

/// Check the caller's role against the route policy table.
pub async fn authorize_middleware(request: Request, next: Next) -> Response {
    let Some((user_id, role)) = request
        .extensions()
        .get::<AuthUser>()
        .map(|user| (user.claims.sub, user.claims.role))
    else {
        return ApiError::unauthorized("Authentication required").into_response();
    };

    let decision = authorize(role, request.method(), request.uri().path());
    if decision == Decision::Allow {
        return next.run(request).await;
    }

    match decision {
        Decision::NoRule => tracing::warn!(
            "No access rule for {} {}, denying user {}",
            request.method(),
            request.uri().path(),
            user_id
        ),
        _ => tracing::warn!(
            "Denied {} {} for user {} with role {}",
            request.method(),
            request.uri().path(),
            user_id,
            role
        ),
    }
    ApiError::forbidden("Insufficient permissions").into_response()
}

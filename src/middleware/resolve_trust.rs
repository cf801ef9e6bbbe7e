use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sqlx::MySqlPool;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;
use crate::tenant::{resolve_slug, TrustContext};

/// Connection of the trust the request was resolved to.
#[derive(Clone)]
pub struct TrustDb(pub Arc<MySqlPool>);

/// Resolve the trust from the host (or dev header), then attach its
/// [`TrustContext`] and [`TrustDb`] to the request.
pub async fn resolve_trust_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    // Only owned data may cross the await below; the body is not Sync
    let slug = resolve_slug(
        request.headers(),
        state.config.is_development(),
        &state.config.tenancy.dev_trust_slug,
    )
    .map_err(|e| ApiError::domain_configuration(e.to_string()));
    let slug = match slug {
        Ok(slug) => slug,
        Err(error) => return error.into_response(),
    };

    match resolve(&state, slug).await {
        Ok((context, db)) => {
            tracing::debug!("Request resolved to trust {} ({})", context.trust_id, context.subdomain);
            request.extensions_mut().insert(context);
            request.extensions_mut().insert(db);
            next.run(request).await
        }
        Err(error) => error.into_response(),
    }
}

async fn resolve(state: &AppState, slug: String) -> Result<(TrustContext, TrustDb), ApiError> {
    let context = state
        .trust_contexts
        .resolve(&slug)
        .await?
        .ok_or_else(|| ApiError::trust_not_found(format!("Trust '{}' not found or inactive", slug)))?;

    let connection = state.connections.trust(context.trust_id).await?;
    Ok((context, TrustDb(connection.conn)))
}

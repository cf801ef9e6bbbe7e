// handlers/auth.rs - /api/v1/auth login, profile and password change

use axum::extract::State;
use axum::Extension;
use serde::Serialize;
use sqlx::MySqlPool;
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TrustDb};
use crate::services::auth_service::{AuthService, ChangePasswordRequest, LoginRequest, LoginResponse, Profile, SystemLoginRequest};
use crate::state::AppState;
use crate::tenant::TrustContext;
use crate::validation::ValidJson;

#[derive(Debug, Serialize)]
pub struct PasswordChanged {
    pub message: &'static str,
}

/// Trust connection when the route resolved a trust, otherwise master.
async fn user_pool(state: &AppState, trust_db: Option<Extension<TrustDb>>) -> Result<Arc<MySqlPool>, ApiError> {
    match trust_db {
        Some(Extension(TrustDb(pool))) => Ok(pool),
        None => Ok(state.connections.master().await?),
    }
}

/// POST /api/v1/auth/system/login - system operator login against master
pub async fn system_login(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<SystemLoginRequest>,
) -> ApiResult<LoginResponse> {
    let master = state.connections.master().await?;
    let response = AuthService::new(&master).system_login(request).await?;
    Ok(ApiResponse::success(response))
}

/// POST /api/v1/auth/login - trust user login on the resolved trust
pub async fn login(
    Extension(context): Extension<TrustContext>,
    Extension(TrustDb(pool)): Extension<TrustDb>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let response = AuthService::new(&pool).login(context.trust_id, request).await?;
    Ok(ApiResponse::success(response))
}

/// GET /api/v1/auth/me and /api/v1/auth/system/me
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    trust_db: Option<Extension<TrustDb>>,
) -> ApiResult<Profile> {
    let pool = user_pool(&state, trust_db).await?;
    Ok(ApiResponse::success(AuthService::new(&pool).profile(&user.claims).await?))
}

/// POST /api/v1/auth/change-password and /api/v1/auth/system/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    trust_db: Option<Extension<TrustDb>>,
    ValidJson(request): ValidJson<ChangePasswordRequest>,
) -> ApiResult<PasswordChanged> {
    let pool = user_pool(&state, trust_db).await?;
    AuthService::new(&pool).change_password(&user.claims, request).await?;
    Ok(ApiResponse::success(PasswordChanged {
        message: "Password changed successfully",
    }))
}

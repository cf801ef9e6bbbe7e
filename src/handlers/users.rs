// handlers/users.rs - /api/v1/users staff and parent accounts

use axum::extract::{Path, Query};
use axum::Extension;

use crate::database::models::user::User;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TrustDb};
use crate::services::user_service::{CreateUserRequest, UpdateUserRequest, UserQuery, UserService};
use crate::services::Page;
use crate::validation::ValidJson;

/// POST /api/v1/users
pub async fn create_user(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    ValidJson(request): ValidJson<CreateUserRequest>,
) -> ApiResult<User> {
    let created = UserService::new(&pool).create_user(request, user.id()).await?;
    Ok(ApiResponse::created(created))
}

/// GET /api/v1/users?role=&is_active=&page=&limit=
pub async fn list_users(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Page<User>> {
    Ok(ApiResponse::success(UserService::new(&pool).list_users(query).await?))
}

/// GET /api/v1/users/:id
pub async fn get_user(Extension(TrustDb(pool)): Extension<TrustDb>, Path(user_id): Path<i64>) -> ApiResult<User> {
    Ok(ApiResponse::success(UserService::new(&pool).get_user(user_id).await?))
}

/// PATCH /api/v1/users/:id
pub async fn update_user(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<i64>,
    ValidJson(request): ValidJson<UpdateUserRequest>,
) -> ApiResult<User> {
    let updated = UserService::new(&pool).update_user(user_id, request, user.id()).await?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/v1/users/:id - deactivate; accounts are never removed
pub async fn deactivate_user(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> ApiResult<User> {
    let deactivated = UserService::new(&pool).deactivate_user(user_id, user.id()).await?;
    Ok(ApiResponse::success(deactivated))
}

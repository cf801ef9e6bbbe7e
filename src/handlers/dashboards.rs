use axum::Extension;

use crate::middleware::{ApiResponse, ApiResult, AuthUser, TrustDb};
use crate::services::dashboard_service::{DashboardService, DashboardSummary};

/// GET /api/v1/dashboards/summary - headline numbers for the resolved trust
pub async fn summary(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<DashboardSummary> {
    Ok(ApiResponse::success(DashboardService::new(&pool).summary(user.id()).await?))
}

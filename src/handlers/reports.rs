// handlers/reports.rs - /api/v1/reports

use axum::extract::Query;
use axum::Extension;

use crate::middleware::{ApiResponse, ApiResult, TrustDb};
use crate::services::report_service::{AttendanceReport, FeeCollectionReport, ReportRange, ReportService, StrengthReport};

/// GET /api/v1/reports/fee-collection?from=&to=
pub async fn fee_collection(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Query(range): Query<ReportRange>,
) -> ApiResult<FeeCollectionReport> {
    Ok(ApiResponse::success(ReportService::new(&pool).fee_collection(range).await?))
}

/// GET /api/v1/reports/attendance?from=&to=&class_id=
pub async fn attendance(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Query(range): Query<ReportRange>,
) -> ApiResult<AttendanceReport> {
    Ok(ApiResponse::success(ReportService::new(&pool).attendance(range).await?))
}

/// GET /api/v1/reports/student-strength
pub async fn student_strength(Extension(TrustDb(pool)): Extension<TrustDb>) -> ApiResult<StrengthReport> {
    Ok(ApiResponse::success(ReportService::new(&pool).strength().await?))
}

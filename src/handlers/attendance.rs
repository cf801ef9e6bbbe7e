// handlers/attendance.rs - /api/v1/attendance marking and summaries

use axum::extract::{Path, Query};
use axum::Extension;
use serde::Serialize;

use crate::middleware::{ApiResponse, ApiResult, AuthUser, TrustDb};
use crate::services::attendance_service::{
    AttendanceKey, AttendanceService, AttendanceSheet, MarkAttendanceRequest, StudentAttendance, SummaryQuery,
};
use crate::validation::ValidJson;

#[derive(Debug, Serialize)]
pub struct AttendanceDeleted {
    pub deleted: u64,
}

/// POST /api/v1/attendance - mark one class section for a date
pub async fn mark_attendance(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    ValidJson(request): ValidJson<MarkAttendanceRequest>,
) -> ApiResult<AttendanceSheet> {
    let sheet = AttendanceService::new(&pool).mark(request, user.id()).await?;
    Ok(ApiResponse::created(sheet))
}

/// GET /api/v1/attendance?date=&class_id=&section_id=
pub async fn get_attendance(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Query(key): Query<AttendanceKey>,
) -> ApiResult<AttendanceSheet> {
    Ok(ApiResponse::success(AttendanceService::new(&pool).get(key).await?))
}

/// DELETE /api/v1/attendance?date=&class_id=&section_id= - clear a marking so it can be redone
pub async fn delete_attendance(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    Query(key): Query<AttendanceKey>,
) -> ApiResult<AttendanceDeleted> {
    let deleted = AttendanceService::new(&pool).delete(key, user.id()).await?;
    Ok(ApiResponse::success(AttendanceDeleted { deleted }))
}

/// GET /api/v1/attendance/students/:id/summary?from=&to=
pub async fn student_summary(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Path(student_id): Path<i64>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<StudentAttendance> {
    let summary = AttendanceService::new(&pool).student_summary(student_id, query).await?;
    Ok(ApiResponse::success(summary))
}

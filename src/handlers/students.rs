// handlers/students.rs - /api/v1/students admissions and records

use axum::extract::{Path, Query};
use axum::Extension;

use crate::database::models::student::Student;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TrustDb};
use crate::services::student_service::{
    AdmitStudentRequest, ChangeStatusRequest, StudentQuery, StudentService, UpdateStudentRequest,
};
use crate::services::Page;
use crate::validation::ValidJson;

/// POST /api/v1/students - admit a student
pub async fn admit_student(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    ValidJson(request): ValidJson<AdmitStudentRequest>,
) -> ApiResult<Student> {
    let student = StudentService::new(&pool).admit_student(request, user.id()).await?;
    Ok(ApiResponse::created(student))
}

/// GET /api/v1/students?class_id=&section_id=&status=&search=&page=&limit=
pub async fn list_students(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Query(query): Query<StudentQuery>,
) -> ApiResult<Page<Student>> {
    Ok(ApiResponse::success(StudentService::new(&pool).list_students(query).await?))
}

/// GET /api/v1/students/:id
pub async fn get_student(Extension(TrustDb(pool)): Extension<TrustDb>, Path(student_id): Path<i64>) -> ApiResult<Student> {
    Ok(ApiResponse::success(StudentService::new(&pool).get_student(student_id).await?))
}

/// PATCH /api/v1/students/:id
pub async fn update_student(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    Path(student_id): Path<i64>,
    ValidJson(request): ValidJson<UpdateStudentRequest>,
) -> ApiResult<Student> {
    let student = StudentService::new(&pool).update_student(student_id, request, user.id()).await?;
    Ok(ApiResponse::success(student))
}

/// PATCH /api/v1/students/:id/status
pub async fn change_status(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    Path(student_id): Path<i64>,
    ValidJson(request): ValidJson<ChangeStatusRequest>,
) -> ApiResult<Student> {
    let student = StudentService::new(&pool).change_status(student_id, request, user.id()).await?;
    Ok(ApiResponse::success(student))
}

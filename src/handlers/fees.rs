// handlers/fees.rs - /api/v1/fees structures, assignments and collections

use axum::extract::{Path, Query};
use axum::Extension;

use crate::database::models::fee::{FeeAssignment, FeeCollection, FeeStructure};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TrustDb};
use crate::services::fee_service::{
    AssignFeeRequest, CollectFeeRequest, CollectionQuery, CreateFeeStructureRequest, FeeService, FeeStructureQuery,
    Receipt, StudentFees,
};
use crate::services::Page;
use crate::validation::ValidJson;

/// POST /api/v1/fees/structures
pub async fn create_structure(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    ValidJson(request): ValidJson<CreateFeeStructureRequest>,
) -> ApiResult<FeeStructure> {
    let structure = FeeService::new(&pool).create_structure(request, user.id()).await?;
    Ok(ApiResponse::created(structure))
}

/// GET /api/v1/fees/structures?class_id=&academic_year=
pub async fn list_structures(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Query(query): Query<FeeStructureQuery>,
) -> ApiResult<Vec<FeeStructure>> {
    Ok(ApiResponse::success(FeeService::new(&pool).list_structures(query).await?))
}

/// POST /api/v1/fees/assignments - assign a structure to a student
pub async fn assign_fee(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    ValidJson(request): ValidJson<AssignFeeRequest>,
) -> ApiResult<FeeAssignment> {
    let assignment = FeeService::new(&pool).assign_fee(request, user.id()).await?;
    Ok(ApiResponse::created(assignment))
}

/// POST /api/v1/fees/collections - record a payment and issue a receipt
pub async fn collect_fee(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    ValidJson(request): ValidJson<CollectFeeRequest>,
) -> ApiResult<Receipt> {
    let receipt = FeeService::new(&pool).collect_fee(request, user.id()).await?;
    Ok(ApiResponse::created(receipt))
}

/// GET /api/v1/fees/collections?student_id=&from=&to=&payment_mode=&page=&limit=
pub async fn list_collections(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Query(query): Query<CollectionQuery>,
) -> ApiResult<Page<FeeCollection>> {
    Ok(ApiResponse::success(FeeService::new(&pool).list_collections(query).await?))
}

/// GET /api/v1/fees/students/:id - a student's assignments and totals
pub async fn student_fees(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Path(student_id): Path<i64>,
) -> ApiResult<StudentFees> {
    Ok(ApiResponse::success(FeeService::new(&pool).student_fees(student_id).await?))
}

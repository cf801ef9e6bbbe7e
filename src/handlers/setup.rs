// handlers/setup.rs - /api/v1/setup trust registry, schools and onboarding wizard

use axum::extract::{Path, State};
use axum::Extension;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::database::models::school::School;
use crate::database::models::trust::Trust;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::onboarding_service::WizardState;
use crate::services::trust_service::{ClassWithSections, CreateSchoolRequest, CreateTrustRequest, UpdateTrustRequest};
use crate::state::AppState;
use crate::validation::ValidJson;

#[derive(Debug, Serialize)]
pub struct TrustCreated {
    pub trust_id: i64,
    pub trust: Trust,
}

#[derive(Debug, Serialize)]
pub struct ConfigUpdated {
    pub trust_id: i64,
    pub updated: usize,
}

/// POST /api/v1/setup/trusts - register a trust and provision its schema
pub async fn create_trust(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidJson(request): ValidJson<CreateTrustRequest>,
) -> ApiResult<TrustCreated> {
    let trust = state.trust_service().create_trust(request, Some(user.id())).await?;
    Ok(ApiResponse::created(TrustCreated { trust_id: trust.id, trust }))
}

/// GET /api/v1/setup/trusts
pub async fn list_trusts(State(state): State<AppState>) -> ApiResult<Vec<Trust>> {
    Ok(ApiResponse::success(state.trust_service().list_trusts().await?))
}

/// GET /api/v1/setup/trusts/:id
pub async fn get_trust(State(state): State<AppState>, Path(trust_id): Path<i64>) -> ApiResult<Trust> {
    Ok(ApiResponse::success(state.trust_service().get_trust(trust_id).await?))
}

/// PATCH /api/v1/setup/trusts/:id
pub async fn update_trust(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(trust_id): Path<i64>,
    ValidJson(request): ValidJson<UpdateTrustRequest>,
) -> ApiResult<Trust> {
    let trust = state.trust_service().update_trust(trust_id, request, Some(user.id())).await?;
    Ok(ApiResponse::success(trust))
}

/// PUT /api/v1/setup/trusts/:id/config - upsert config keys for one trust
pub async fn set_trust_config(
    State(state): State<AppState>,
    Path(trust_id): Path<i64>,
    ValidJson(entries): ValidJson<Map<String, Value>>,
) -> ApiResult<ConfigUpdated> {
    let updated = state.trust_service().set_config(trust_id, entries).await?;
    Ok(ApiResponse::success(ConfigUpdated { trust_id, updated }))
}

/// POST /api/v1/setup/trusts/:id/schools
pub async fn create_school(
    State(state): State<AppState>,
    Path(trust_id): Path<i64>,
    ValidJson(request): ValidJson<CreateSchoolRequest>,
) -> ApiResult<School> {
    let school = state.trust_service().create_school(trust_id, request).await?;
    Ok(ApiResponse::created(school))
}

/// GET /api/v1/setup/trusts/:id/schools
pub async fn list_schools(State(state): State<AppState>, Path(trust_id): Path<i64>) -> ApiResult<Vec<School>> {
    Ok(ApiResponse::success(state.trust_service().list_schools(trust_id).await?))
}

/// GET /api/v1/setup/trusts/:id/schools/:school_id/classes
pub async fn list_classes(
    State(state): State<AppState>,
    Path((trust_id, school_id)): Path<(i64, i64)>,
) -> ApiResult<Vec<ClassWithSections>> {
    Ok(ApiResponse::success(state.trust_service().list_classes(trust_id, school_id).await?))
}

/// GET /api/v1/setup/wizard - the caller's onboarding session
pub async fn wizard_state(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<WizardState> {
    Ok(ApiResponse::success(state.onboarding().state(user.id(), Utc::now()).await))
}

/// POST /api/v1/setup/wizard/steps/:step_id - submit one step's data
pub async fn wizard_submit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(step_id): Path<String>,
    ValidJson(data): ValidJson<Value>,
) -> ApiResult<WizardState> {
    let view = state.onboarding().submit(user.id(), &step_id, data, Utc::now()).await?;
    Ok(ApiResponse::success(view))
}

/// POST /api/v1/setup/wizard/reset
pub async fn wizard_reset(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<WizardState> {
    Ok(ApiResponse::success(state.onboarding().reset(user.id(), Utc::now()).await))
}

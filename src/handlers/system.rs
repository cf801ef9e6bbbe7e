// handlers/system.rs - /api/v1/system probes, cache and migrations

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use crate::database::{run_migrations, ConnectionStatus, DatabaseError, MigrationScope};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::validation::{FieldErrors, ValidJson, Validate};

#[derive(Debug, Serialize)]
pub struct MigrationRun {
    pub scope: MigrationScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_id: Option<i64>,
    pub applied: Vec<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearCacheRequest {
    pub slug: Option<String>,
}

impl Validate for ClearCacheRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(slug) = &self.slug {
            errors.required("slug", slug);
        }
        errors.into_result()
    }
}

#[derive(Debug, Serialize)]
pub struct CacheCleared {
    pub cleared: usize,
}

/// GET /api/v1/system/health - master database probe
pub async fn health(State(state): State<AppState>) -> ApiResult<ConnectionStatus> {
    let status = state.connections.test_master().await;
    if !status.connected {
        tracing::warn!("Master database probe failed: {:?}", status.error);
    }
    Ok(ApiResponse::success(status))
}

/// GET /api/v1/system/trusts/:id/connection - trust database probe
pub async fn trust_connection(State(state): State<AppState>, Path(trust_id): Path<i64>) -> ApiResult<ConnectionStatus> {
    Ok(ApiResponse::success(state.connections.test_trust(trust_id).await))
}

/// POST /api/v1/system/cache/clear - drop one or all cached trust contexts
pub async fn clear_cache(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<ClearCacheRequest>,
) -> ApiResult<CacheCleared> {
    let cleared = state.trust_contexts.clear(request.slug.as_deref()).await;
    Ok(ApiResponse::success(CacheCleared { cleared }))
}

/// POST /api/v1/system/migrations/master
pub async fn migrate_master(State(state): State<AppState>) -> ApiResult<MigrationRun> {
    let master = state.connections.master().await?;
    let applied = run_migrations(&master, MigrationScope::Master)
        .await
        .map_err(DatabaseError::from)?;
    Ok(ApiResponse::success(MigrationRun {
        scope: MigrationScope::Master,
        trust_id: None,
        applied,
    }))
}

/// POST /api/v1/system/migrations/trusts/:id
pub async fn migrate_trust(State(state): State<AppState>, Path(trust_id): Path<i64>) -> ApiResult<MigrationRun> {
    let applied = state.trust_service().migrate_trust(trust_id).await?;
    Ok(ApiResponse::success(MigrationRun {
        scope: MigrationScope::Trust,
        trust_id: Some(trust_id),
        applied,
    }))
}

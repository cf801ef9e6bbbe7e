//! Best-effort audit trail. A failed audit write is logged, never surfaced.

use serde_json::Value;
use sqlx::MySqlPool;
use tracing::warn;

pub use crate::repositories::audit::AuditTable;
use crate::repositories::audit;

pub async fn record(
    pool: &MySqlPool,
    table: AuditTable,
    user_id: Option<i64>,
    action: &str,
    entity_type: &str,
    entity_id: Option<i64>,
    details: Option<Value>,
) {
    let details = details.map(|d| d.to_string());
    if let Err(e) = audit::insert(pool, table, user_id, action, entity_type, entity_id, details.as_deref()).await {
        warn!("Failed to write audit log for {} {}: {}", action, entity_type, e);
    }
}

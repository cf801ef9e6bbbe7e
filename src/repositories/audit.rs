use sqlx::MySqlPool;

/// Which audit table to write: the master log or the trust schema's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditTable {
    System,
    Trust,
}

impl AuditTable {
    fn name(&self) -> &'static str {
        match self {
            AuditTable::System => "system_audit_logs",
            AuditTable::Trust => "audit_logs",
        }
    }
}

pub async fn insert(
    pool: &MySqlPool,
    table: AuditTable,
    user_id: Option<i64>,
    action: &str,
    entity_type: &str,
    entity_id: Option<i64>,
    details: Option<&str>,
) -> Result<(), sqlx::Error> {
    let sql = format!(
        "INSERT INTO {} (user_id, action, entity_type, entity_id, details) VALUES (?, ?, ?, ?, ?)",
        table.name()
    );
    sqlx::query(&sql)
        .bind(user_id)
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(details)
        .execute(pool)
        .await?;
    Ok(())
}

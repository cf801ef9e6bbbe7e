use sqlx::{MySqlConnection, MySqlPool};

use crate::database::models::trust::Trust;

const TRUST_COLUMNS: &str = "id, trust_name, trust_code, subdomain, contact_email, contact_phone, address,
     is_active, created_at, updated_at";

pub struct NewTrust<'a> {
    pub trust_name: &'a str,
    pub trust_code: &'a str,
    pub subdomain: &'a str,
    pub contact_email: &'a str,
    pub contact_phone: Option<&'a str>,
    pub address: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct TrustChanges {
    pub trust_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn find_by_id(pool: &MySqlPool, id: i64) -> Result<Option<Trust>, sqlx::Error> {
    sqlx::query_as::<_, Trust>(&format!("SELECT {} FROM trusts WHERE id = ?", TRUST_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &MySqlPool) -> Result<Vec<Trust>, sqlx::Error> {
    sqlx::query_as::<_, Trust>(&format!("SELECT {} FROM trusts ORDER BY trust_name", TRUST_COLUMNS))
        .fetch_all(pool)
        .await
}

/// `(code_taken, subdomain_taken)`, case-insensitive.
pub async fn find_conflicts(pool: &MySqlPool, trust_code: &str, subdomain: &str) -> Result<(bool, bool), sqlx::Error> {
    let (code, sub): (i64, i64) = sqlx::query_as(
        "SELECT
            CAST(COALESCE(SUM(UPPER(trust_code) = UPPER(?)), 0) AS SIGNED),
            CAST(COALESCE(SUM(LOWER(subdomain) = LOWER(?)), 0) AS SIGNED)
         FROM trusts",
    )
    .bind(trust_code)
    .bind(subdomain)
    .fetch_one(pool)
    .await?;
    Ok((code > 0, sub > 0))
}

pub async fn insert(pool: &MySqlPool, trust: &NewTrust<'_>) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO trusts (trust_name, trust_code, subdomain, contact_email, contact_phone, address, is_active)
         VALUES (?, ?, ?, ?, ?, ?, 1)",
    )
    .bind(trust.trust_name)
    .bind(trust.trust_code)
    .bind(trust.subdomain)
    .bind(trust.contact_email)
    .bind(trust.contact_phone)
    .bind(trust.address)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id() as i64)
}

pub async fn update(pool: &MySqlPool, id: i64, changes: &TrustChanges) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE trusts SET
            trust_name = COALESCE(?, trust_name),
            contact_email = COALESCE(?, contact_email),
            contact_phone = COALESCE(?, contact_phone),
            address = COALESCE(?, address),
            is_active = COALESCE(?, is_active)
         WHERE id = ?",
    )
    .bind(changes.trust_name.as_deref())
    .bind(changes.contact_email.as_deref())
    .bind(changes.contact_phone.as_deref())
    .bind(changes.address.as_deref())
    .bind(changes.is_active)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &MySqlPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM trusts WHERE id = ?").bind(id).execute(pool).await?;
    Ok(())
}

pub async fn upsert_config(conn: &mut MySqlConnection, trust_id: i64, key: &str, value: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO system_config (trust_id, config_key, config_value) VALUES (?, ?, ?)
         ON DUPLICATE KEY UPDATE config_value = VALUES(config_value)",
    )
    .bind(trust_id)
    .bind(key)
    .bind(value)
    .execute(conn)
    .await?;
    Ok(())
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of the master `trusts` registry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trust {
    pub id: i64,
    pub trust_name: String,
    pub trust_code: String,
    pub subdomain: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of the master `system_config` table. `trust_id = NULL` is a global default.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConfigEntry {
    pub trust_id: Option<i64>,
    pub config_key: String,
    pub config_value: String,
}

/// Platform operator stored in the master `system_users` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SystemUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

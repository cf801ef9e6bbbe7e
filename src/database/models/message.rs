use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub subject: String,
    pub body: String,
    pub audience: String,
    pub audience_filter: Option<String>,
    pub priority: String,
    pub created_at: DateTime<Utc>,
}

/// A message as seen by one recipient.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InboxItem {
    pub message_id: i64,
    pub sender_id: i64,
    pub subject: String,
    pub body: String,
    pub priority: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

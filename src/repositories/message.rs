use sqlx::{MySqlConnection, MySqlPool};

use crate::database::models::message::{InboxItem, Message};

pub struct NewMessage<'a> {
    pub sender_id: i64,
    pub subject: &'a str,
    pub body: &'a str,
    pub audience: &'a str,
    pub audience_filter: Option<&'a str>,
    pub priority: &'a str,
}

pub async fn insert(conn: &mut MySqlConnection, message: &NewMessage<'_>) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO messages (sender_id, subject, body, audience, audience_filter, priority) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(message.sender_id)
    .bind(message.subject)
    .bind(message.body)
    .bind(message.audience)
    .bind(message.audience_filter)
    .bind(message.priority)
    .execute(conn)
    .await?;
    Ok(result.last_insert_id() as i64)
}

pub async fn insert_recipient(conn: &mut MySqlConnection, message_id: i64, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT IGNORE INTO message_recipients (message_id, user_id) VALUES (?, ?)")
        .bind(message_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn find(pool: &MySqlPool, id: i64) -> Result<Option<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>(
        "SELECT id, sender_id, subject, body, audience, audience_filter, priority, created_at FROM messages WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_sent(pool: &MySqlPool, sender_id: i64, limit: i64, offset: i64) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>(
        "SELECT id, sender_id, subject, body, audience, audience_filter, priority, created_at
         FROM messages
         WHERE sender_id = ?
         ORDER BY created_at DESC, id DESC
         LIMIT ? OFFSET ?",
    )
    .bind(sender_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn inbox(
    pool: &MySqlPool,
    user_id: i64,
    unread_only: bool,
    limit: i64,
    offset: i64,
) -> Result<Vec<InboxItem>, sqlx::Error> {
    sqlx::query_as::<_, InboxItem>(
        "SELECT m.id AS message_id, m.sender_id, m.subject, m.body, m.priority, m.created_at, r.read_at
         FROM message_recipients r
         JOIN messages m ON m.id = r.message_id
         WHERE r.user_id = ? AND (? = 0 OR r.read_at IS NULL)
         ORDER BY m.created_at DESC, m.id DESC
         LIMIT ? OFFSET ?",
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn unread_count(pool: &MySqlPool, user_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM message_recipients WHERE user_id = ? AND read_at IS NULL")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

/// `false` when the caller is not a recipient of the message.
pub async fn mark_read(pool: &MySqlPool, message_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
    let exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM message_recipients WHERE message_id = ? AND user_id = ?",
    )
    .bind(message_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    if exists == 0 {
        return Ok(false);
    }

    sqlx::query(
        "UPDATE message_recipients SET read_at = COALESCE(read_at, CURRENT_TIMESTAMP)
         WHERE message_id = ? AND user_id = ?",
    )
    .bind(message_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(true)
}

use sqlx::MySqlPool;

use crate::database::models::trust::SystemUser;

pub async fn find_by_username(pool: &MySqlPool, username: &str) -> Result<Option<SystemUser>, sqlx::Error> {
    sqlx::query_as::<_, SystemUser>(
        "SELECT id, username, email, password_hash, full_name, role, is_active, last_login_at, created_at
         FROM system_users
         WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_id(pool: &MySqlPool, id: i64) -> Result<Option<SystemUser>, sqlx::Error> {
    sqlx::query_as::<_, SystemUser>(
        "SELECT id, username, email, password_hash, full_name, role, is_active, last_login_at, created_at
         FROM system_users
         WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert(
    pool: &MySqlPool,
    username: &str,
    email: &str,
    password_hash: &str,
    full_name: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO system_users (username, email, password_hash, full_name, role) VALUES (?, ?, ?, ?, 'SYSTEM_ADMIN')",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(full_name)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id() as i64)
}

pub async fn touch_login(pool: &MySqlPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE system_users SET last_login_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_password(pool: &MySqlPool, id: i64, password_hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE system_users SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

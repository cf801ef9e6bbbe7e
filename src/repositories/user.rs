use sqlx::MySqlPool;

use crate::database::models::user::User;

const USER_COLUMNS: &str = "id, school_id, email, password_hash, full_name, phone, role, is_active,
     last_login_at, created_at, updated_at";

pub struct NewUser<'a> {
    pub school_id: Option<i64>,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub phone: Option<&'a str>,
    pub role: &'a str,
}

#[derive(Debug, Default)]
pub struct UserFilter {
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Default)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub school_id: Option<i64>,
}

pub async fn find_by_id(pool: &MySqlPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_email(pool: &MySqlPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn email_exists(pool: &MySqlPool, email: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn insert(pool: &MySqlPool, user: &NewUser<'_>) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO users (school_id, email, password_hash, full_name, phone, role) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user.school_id)
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.full_name)
    .bind(user.phone)
    .bind(user.role)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id() as i64)
}

pub async fn list(pool: &MySqlPool, filter: &UserFilter) -> Result<(Vec<User>, i64), sqlx::Error> {
    let clause = "FROM users WHERE (? IS NULL OR role = ?) AND (? IS NULL OR is_active = ?)";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {}", clause))
        .bind(filter.role.as_deref())
        .bind(filter.role.as_deref())
        .bind(filter.is_active)
        .bind(filter.is_active)
        .fetch_one(pool)
        .await?;

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} {} ORDER BY full_name LIMIT ? OFFSET ?",
        USER_COLUMNS, clause
    ))
    .bind(filter.role.as_deref())
    .bind(filter.role.as_deref())
    .bind(filter.is_active)
    .bind(filter.is_active)
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(pool)
    .await?;

    Ok((users, total))
}

pub async fn update(pool: &MySqlPool, id: i64, changes: &UserChanges) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET
            full_name = COALESCE(?, full_name),
            phone = COALESCE(?, phone),
            role = COALESCE(?, role),
            school_id = COALESCE(?, school_id)
         WHERE id = ?",
    )
    .bind(changes.full_name.as_deref())
    .bind(changes.phone.as_deref())
    .bind(changes.role.as_deref())
    .bind(changes.school_id)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_active(pool: &MySqlPool, id: i64, is_active: bool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn touch_login(pool: &MySqlPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_password(pool: &MySqlPool, id: i64, password_hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Active users holding `role`.
pub async fn ids_by_role(pool: &MySqlPool, role: &str) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM users WHERE role = ? AND is_active = 1")
        .bind(role)
        .fetch_all(pool)
        .await
}

pub async fn all_active_ids(pool: &MySqlPool) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM users WHERE is_active = 1")
        .fetch_all(pool)
        .await
}

/// Subset of `ids` that are active users.
pub async fn existing_active_ids(pool: &MySqlPool, ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("SELECT id FROM users WHERE is_active = 1 AND id IN ({})", placeholders);
    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    query.fetch_all(pool).await
}

pub async fn count_staff(pool: &MySqlPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = 1 AND role <> 'PARENT'")
        .fetch_one(pool)
        .await
}

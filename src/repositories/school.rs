use sqlx::{MySqlConnection, MySqlPool};

use crate::database::models::school::{ClassRow, School, Section};

pub struct NewSchool<'a> {
    pub school_name: &'a str,
    pub school_code: &'a str,
    pub board: Option<&'a str>,
    pub address: Option<&'a str>,
    pub academic_year: &'a str,
}

pub async fn insert_school(conn: &mut MySqlConnection, school: &NewSchool<'_>) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO schools (school_name, school_code, board, address, academic_year) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(school.school_name)
    .bind(school.school_code)
    .bind(school.board)
    .bind(school.address)
    .bind(school.academic_year)
    .execute(conn)
    .await?;
    Ok(result.last_insert_id() as i64)
}

pub async fn list_schools(pool: &MySqlPool) -> Result<Vec<School>, sqlx::Error> {
    sqlx::query_as::<_, School>(
        "SELECT id, school_name, school_code, board, address, academic_year, is_active, created_at
         FROM schools
         ORDER BY school_name",
    )
    .fetch_all(pool)
    .await
}

pub async fn find_school(pool: &MySqlPool, id: i64) -> Result<Option<School>, sqlx::Error> {
    sqlx::query_as::<_, School>(
        "SELECT id, school_name, school_code, board, address, academic_year, is_active, created_at
         FROM schools
         WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_class(conn: &mut MySqlConnection, school_id: i64, class_name: &str, display_order: i32) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO classes (school_id, class_name, display_order) VALUES (?, ?, ?)")
        .bind(school_id)
        .bind(class_name)
        .bind(display_order)
        .execute(conn)
        .await?;
    Ok(result.last_insert_id() as i64)
}

pub async fn insert_section(conn: &mut MySqlConnection, class_id: i64, section_name: &str) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO sections (class_id, section_name) VALUES (?, ?)")
        .bind(class_id)
        .bind(section_name)
        .execute(conn)
        .await?;
    Ok(result.last_insert_id() as i64)
}

pub async fn find_class(pool: &MySqlPool, id: i64) -> Result<Option<ClassRow>, sqlx::Error> {
    sqlx::query_as::<_, ClassRow>("SELECT id, school_id, class_name, display_order FROM classes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Section only when it belongs to `class_id`.
pub async fn find_section(pool: &MySqlPool, class_id: i64, section_id: i64) -> Result<Option<Section>, sqlx::Error> {
    sqlx::query_as::<_, Section>(
        "SELECT id, class_id, section_name, class_teacher_id FROM sections WHERE id = ? AND class_id = ?",
    )
    .bind(section_id)
    .bind(class_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_classes(pool: &MySqlPool, school_id: i64) -> Result<Vec<ClassRow>, sqlx::Error> {
    sqlx::query_as::<_, ClassRow>(
        "SELECT id, school_id, class_name, display_order FROM classes WHERE school_id = ? ORDER BY display_order, class_name",
    )
    .bind(school_id)
    .fetch_all(pool)
    .await
}

pub async fn list_sections(pool: &MySqlPool, class_id: i64) -> Result<Vec<Section>, sqlx::Error> {
    sqlx::query_as::<_, Section>(
        "SELECT id, class_id, section_name, class_teacher_id FROM sections WHERE class_id = ? ORDER BY section_name",
    )
    .bind(class_id)
    .fetch_all(pool)
    .await
}

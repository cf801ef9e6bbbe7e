use chrono::NaiveDate;
use sqlx::MySqlPool;

use crate::database::models::student::Student;

const STUDENT_COLUMNS: &str = "id, school_id, admission_number, first_name, last_name, date_of_birth, gender,
     class_id, section_id, roll_number, guardian_name, guardian_phone, guardian_email, parent_user_id,
     admission_date, status, created_at, updated_at";

pub struct NewStudent<'a> {
    pub school_id: i64,
    pub admission_number: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub date_of_birth: NaiveDate,
    pub gender: &'a str,
    pub class_id: i64,
    pub section_id: i64,
    pub roll_number: Option<i32>,
    pub guardian_name: &'a str,
    pub guardian_phone: &'a str,
    pub guardian_email: Option<&'a str>,
    pub parent_user_id: Option<i64>,
    pub admission_date: NaiveDate,
}

#[derive(Debug, Default)]
pub struct StudentFilter {
    pub class_id: Option<i64>,
    pub section_id: Option<i64>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Default)]
pub struct StudentChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub class_id: Option<i64>,
    pub section_id: Option<i64>,
    pub roll_number: Option<i32>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub guardian_email: Option<String>,
    pub parent_user_id: Option<i64>,
}

pub async fn find_by_id(pool: &MySqlPool, id: i64) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn admission_number_exists(pool: &MySqlPool, admission_number: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students WHERE admission_number = ?")
        .bind(admission_number)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn insert(pool: &MySqlPool, student: &NewStudent<'_>) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO students (school_id, admission_number, first_name, last_name, date_of_birth, gender,
            class_id, section_id, roll_number, guardian_name, guardian_phone, guardian_email, parent_user_id,
            admission_date)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(student.school_id)
    .bind(student.admission_number)
    .bind(student.first_name)
    .bind(student.last_name)
    .bind(student.date_of_birth)
    .bind(student.gender)
    .bind(student.class_id)
    .bind(student.section_id)
    .bind(student.roll_number)
    .bind(student.guardian_name)
    .bind(student.guardian_phone)
    .bind(student.guardian_email)
    .bind(student.parent_user_id)
    .bind(student.admission_date)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id() as i64)
}

pub async fn list(pool: &MySqlPool, filter: &StudentFilter) -> Result<(Vec<Student>, i64), sqlx::Error> {
    let clause = "FROM students
         WHERE (? IS NULL OR class_id = ?)
           AND (? IS NULL OR section_id = ?)
           AND (? IS NULL OR status = ?)
           AND (? IS NULL OR CONCAT(first_name, ' ', last_name, ' ', admission_number) LIKE ?)";
    let search = filter.search.as_ref().map(|s| format!("%{}%", s));

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {}", clause))
        .bind(filter.class_id)
        .bind(filter.class_id)
        .bind(filter.section_id)
        .bind(filter.section_id)
        .bind(filter.status.as_deref())
        .bind(filter.status.as_deref())
        .bind(search.as_deref())
        .bind(search.as_deref())
        .fetch_one(pool)
        .await?;

    let students = sqlx::query_as::<_, Student>(&format!(
        "SELECT {} {} ORDER BY class_id, section_id, roll_number, first_name LIMIT ? OFFSET ?",
        STUDENT_COLUMNS, clause
    ))
    .bind(filter.class_id)
    .bind(filter.class_id)
    .bind(filter.section_id)
    .bind(filter.section_id)
    .bind(filter.status.as_deref())
    .bind(filter.status.as_deref())
    .bind(search.as_deref())
    .bind(search.as_deref())
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(pool)
    .await?;

    Ok((students, total))
}

pub async fn update(pool: &MySqlPool, id: i64, changes: &StudentChanges) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE students SET
            first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            class_id = COALESCE(?, class_id),
            section_id = COALESCE(?, section_id),
            roll_number = COALESCE(?, roll_number),
            guardian_name = COALESCE(?, guardian_name),
            guardian_phone = COALESCE(?, guardian_phone),
            guardian_email = COALESCE(?, guardian_email),
            parent_user_id = COALESCE(?, parent_user_id)
         WHERE id = ?",
    )
    .bind(changes.first_name.as_deref())
    .bind(changes.last_name.as_deref())
    .bind(changes.class_id)
    .bind(changes.section_id)
    .bind(changes.roll_number)
    .bind(changes.guardian_name.as_deref())
    .bind(changes.guardian_phone.as_deref())
    .bind(changes.guardian_email.as_deref())
    .bind(changes.parent_user_id)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_status(pool: &MySqlPool, id: i64, status: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE students SET status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Ids of active students in one class section.
pub async fn active_ids_in_section(pool: &MySqlPool, class_id: i64, section_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT id FROM students WHERE class_id = ? AND section_id = ? AND status = 'ACTIVE'",
    )
    .bind(class_id)
    .bind(section_id)
    .fetch_all(pool)
    .await
}

/// Parent accounts linked to active students of a class.
pub async fn parent_ids_in_class(pool: &MySqlPool, class_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT DISTINCT parent_user_id FROM students
         WHERE class_id = ? AND status = 'ACTIVE' AND parent_user_id IS NOT NULL",
    )
    .bind(class_id)
    .fetch_all(pool)
    .await
}

pub async fn count_active(pool: &MySqlPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM students WHERE status = 'ACTIVE'")
        .fetch_one(pool)
        .await
}

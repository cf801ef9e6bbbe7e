use chrono::NaiveDate;
use sqlx::{MySqlConnection, MySqlPool};

use crate::database::models::attendance::AttendanceRecord;

pub async fn count_for_key(
    pool: &MySqlPool,
    date: NaiveDate,
    class_id: i64,
    section_id: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM attendance_records WHERE attendance_date = ? AND class_id = ? AND section_id = ?",
    )
    .bind(date)
    .bind(class_id)
    .bind(section_id)
    .fetch_one(pool)
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    conn: &mut MySqlConnection,
    student_id: i64,
    class_id: i64,
    section_id: i64,
    date: NaiveDate,
    status: &str,
    remarks: Option<&str>,
    marked_by: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO attendance_records (student_id, class_id, section_id, attendance_date, status, remarks, marked_by)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(student_id)
    .bind(class_id)
    .bind(section_id)
    .bind(date)
    .bind(status)
    .bind(remarks)
    .bind(marked_by)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_for_key(
    pool: &MySqlPool,
    date: NaiveDate,
    class_id: i64,
    section_id: i64,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        "SELECT id, student_id, class_id, section_id, attendance_date, status, remarks, marked_by
         FROM attendance_records
         WHERE attendance_date = ? AND class_id = ? AND section_id = ?
         ORDER BY student_id",
    )
    .bind(date)
    .bind(class_id)
    .bind(section_id)
    .fetch_all(pool)
    .await
}

pub async fn delete_for_key(pool: &MySqlPool, date: NaiveDate, class_id: i64, section_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM attendance_records WHERE attendance_date = ? AND class_id = ? AND section_id = ?",
    )
    .bind(date)
    .bind(class_id)
    .bind(section_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Statuses recorded for one student in an inclusive date range.
pub async fn statuses_for_student(
    pool: &MySqlPool,
    student_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT status FROM attendance_records
         WHERE student_id = ? AND attendance_date BETWEEN ? AND ?",
    )
    .bind(student_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

/// `(status, count)` for every record on one date.
pub async fn status_counts_on(pool: &MySqlPool, date: NaiveDate) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as("SELECT status, COUNT(*) FROM attendance_records WHERE attendance_date = ? GROUP BY status")
        .bind(date)
        .fetch_all(pool)
        .await
}

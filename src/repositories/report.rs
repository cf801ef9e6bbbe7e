//! Aggregate queries behind reports and dashboards.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, MySqlPool};

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct ModeTotal {
    pub payment_mode: String,
    pub transactions: i64,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct SectionAttendance {
    pub class_id: i64,
    pub class_name: String,
    pub section_id: i64,
    pub section_name: String,
    pub total_records: i64,
    pub present_records: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct StrengthRow {
    pub class_id: i64,
    pub class_name: String,
    pub section_id: i64,
    pub section_name: String,
    pub gender: String,
    pub students: i64,
}

pub async fn collection_totals_by_mode(
    pool: &MySqlPool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<ModeTotal>, sqlx::Error> {
    sqlx::query_as::<_, ModeTotal>(
        "SELECT payment_mode, COUNT(*) AS transactions, CAST(SUM(amount) AS DECIMAL(14,2)) AS amount
         FROM fee_collections
         WHERE payment_date BETWEEN ? AND ?
         GROUP BY payment_mode
         ORDER BY payment_mode",
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

pub async fn attendance_by_section(
    pool: &MySqlPool,
    from: NaiveDate,
    to: NaiveDate,
    class_id: Option<i64>,
) -> Result<Vec<SectionAttendance>, sqlx::Error> {
    sqlx::query_as::<_, SectionAttendance>(
        "SELECT a.class_id, c.class_name, a.section_id, s.section_name,
                COUNT(*) AS total_records,
                CAST(SUM(a.status IN ('PRESENT', 'LATE')) AS SIGNED) AS present_records
         FROM attendance_records a
         JOIN classes c ON c.id = a.class_id
         JOIN sections s ON s.id = a.section_id
         WHERE a.attendance_date BETWEEN ? AND ?
           AND (? IS NULL OR a.class_id = ?)
         GROUP BY a.class_id, c.class_name, a.section_id, s.section_name, c.display_order
         ORDER BY c.display_order, s.section_name",
    )
    .bind(from)
    .bind(to)
    .bind(class_id)
    .bind(class_id)
    .fetch_all(pool)
    .await
}

pub async fn strength(pool: &MySqlPool) -> Result<Vec<StrengthRow>, sqlx::Error> {
    sqlx::query_as::<_, StrengthRow>(
        "SELECT st.class_id, c.class_name, st.section_id, s.section_name, st.gender, COUNT(*) AS students
         FROM students st
         JOIN classes c ON c.id = st.class_id
         JOIN sections s ON s.id = st.section_id
         WHERE st.status = 'ACTIVE'
         GROUP BY st.class_id, c.class_name, st.section_id, s.section_name, st.gender, c.display_order
         ORDER BY c.display_order, s.section_name, st.gender",
    )
    .fetch_all(pool)
    .await
}

pub async fn collected_between(pool: &MySqlPool, from: NaiveDate, to: NaiveDate) -> Result<Decimal, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT CAST(COALESCE(SUM(amount), 0) AS DECIMAL(14,2)) FROM fee_collections WHERE payment_date BETWEEN ? AND ?",
    )
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await
}

pub async fn outstanding_balance(pool: &MySqlPool) -> Result<Decimal, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT CAST(COALESCE(SUM(balance_amount), 0) AS DECIMAL(14,2)) FROM student_fee_assignments WHERE status <> 'PAID'",
    )
    .fetch_one(pool)
    .await
}

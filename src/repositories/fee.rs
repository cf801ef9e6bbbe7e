use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{MySqlConnection, MySqlPool};

use crate::database::models::fee::{FeeAssignment, FeeCollection, FeeStructure};

const STRUCTURE_COLUMNS: &str =
    "id, school_id, class_id, fee_head, amount, frequency, academic_year, due_day, is_active, created_at";

const ASSIGNMENT_COLUMNS: &str = "id, student_id, fee_structure_id, total_amount, discount_percentage, discount_amount,
     discount_reason, final_amount, paid_amount, balance_amount, due_date, status, created_at, updated_at";

const COLLECTION_COLUMNS: &str = "id, assignment_id, student_id, receipt_number, amount, payment_mode, reference_number,
     payment_date, collected_by, remarks, created_at";

pub struct NewFeeStructure<'a> {
    pub school_id: i64,
    pub class_id: Option<i64>,
    pub fee_head: &'a str,
    pub amount: Decimal,
    pub frequency: &'a str,
    pub academic_year: &'a str,
    pub due_day: Option<i32>,
}

pub struct NewAssignment<'a> {
    pub student_id: i64,
    pub fee_structure_id: i64,
    pub total_amount: Decimal,
    pub discount_percentage: Option<Decimal>,
    pub discount_amount: Decimal,
    pub discount_reason: Option<&'a str>,
    pub final_amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub status: &'a str,
}

pub struct NewCollection<'a> {
    pub assignment_id: i64,
    pub student_id: i64,
    pub receipt_number: &'a str,
    pub amount: Decimal,
    pub payment_mode: &'a str,
    pub reference_number: Option<&'a str>,
    pub payment_date: NaiveDate,
    pub collected_by: i64,
    pub remarks: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct CollectionFilter {
    pub student_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub payment_mode: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn insert_structure(pool: &MySqlPool, fee: &NewFeeStructure<'_>) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO fee_structures (school_id, class_id, fee_head, amount, frequency, academic_year, due_day)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(fee.school_id)
    .bind(fee.class_id)
    .bind(fee.fee_head)
    .bind(fee.amount)
    .bind(fee.frequency)
    .bind(fee.academic_year)
    .bind(fee.due_day)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id() as i64)
}

/// Null-safe on `class_id`, so school-wide heads collide with each other.
pub async fn structure_exists(
    pool: &MySqlPool,
    school_id: i64,
    class_id: Option<i64>,
    fee_head: &str,
    academic_year: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM fee_structures
         WHERE school_id = ? AND class_id <=> ? AND fee_head = ? AND academic_year = ?
         LIMIT 1",
    )
    .bind(school_id)
    .bind(class_id)
    .bind(fee_head)
    .bind(academic_year)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

pub async fn find_structure(pool: &MySqlPool, id: i64) -> Result<Option<FeeStructure>, sqlx::Error> {
    sqlx::query_as::<_, FeeStructure>(&format!("SELECT {} FROM fee_structures WHERE id = ?", STRUCTURE_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_structures(
    pool: &MySqlPool,
    class_id: Option<i64>,
    academic_year: Option<&str>,
) -> Result<Vec<FeeStructure>, sqlx::Error> {
    sqlx::query_as::<_, FeeStructure>(&format!(
        "SELECT {} FROM fee_structures
         WHERE is_active = 1
           AND (? IS NULL OR class_id = ? OR class_id IS NULL)
           AND (? IS NULL OR academic_year = ?)
         ORDER BY academic_year DESC, fee_head",
        STRUCTURE_COLUMNS
    ))
    .bind(class_id)
    .bind(class_id)
    .bind(academic_year)
    .bind(academic_year)
    .fetch_all(pool)
    .await
}

pub async fn assignment_exists(pool: &MySqlPool, student_id: i64, fee_structure_id: i64) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM student_fee_assignments WHERE student_id = ? AND fee_structure_id = ?",
    )
    .bind(student_id)
    .bind(fee_structure_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn insert_assignment(pool: &MySqlPool, assignment: &NewAssignment<'_>) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO student_fee_assignments (student_id, fee_structure_id, total_amount, discount_percentage,
            discount_amount, discount_reason, final_amount, paid_amount, balance_amount, due_date, status)
         VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)",
    )
    .bind(assignment.student_id)
    .bind(assignment.fee_structure_id)
    .bind(assignment.total_amount)
    .bind(assignment.discount_percentage)
    .bind(assignment.discount_amount)
    .bind(assignment.discount_reason)
    .bind(assignment.final_amount)
    .bind(assignment.final_amount)
    .bind(assignment.due_date)
    .bind(assignment.status)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id() as i64)
}

pub async fn find_assignment(pool: &MySqlPool, id: i64) -> Result<Option<FeeAssignment>, sqlx::Error> {
    sqlx::query_as::<_, FeeAssignment>(&format!(
        "SELECT {} FROM student_fee_assignments WHERE id = ?",
        ASSIGNMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Row-locked read inside a collection transaction.
pub async fn lock_assignment(conn: &mut MySqlConnection, id: i64) -> Result<Option<FeeAssignment>, sqlx::Error> {
    sqlx::query_as::<_, FeeAssignment>(&format!(
        "SELECT {} FROM student_fee_assignments WHERE id = ? FOR UPDATE",
        ASSIGNMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
}

pub async fn list_assignments_for_student(pool: &MySqlPool, student_id: i64) -> Result<Vec<FeeAssignment>, sqlx::Error> {
    sqlx::query_as::<_, FeeAssignment>(&format!(
        "SELECT {} FROM student_fee_assignments WHERE student_id = ? ORDER BY due_date, id",
        ASSIGNMENT_COLUMNS
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub async fn apply_payment(
    conn: &mut MySqlConnection,
    assignment_id: i64,
    paid_amount: Decimal,
    balance_amount: Decimal,
    status: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE student_fee_assignments SET paid_amount = ?, balance_amount = ?, status = ? WHERE id = ?",
    )
    .bind(paid_amount)
    .bind(balance_amount)
    .bind(status)
    .bind(assignment_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_collection(conn: &mut MySqlConnection, collection: &NewCollection<'_>) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO fee_collections (assignment_id, student_id, receipt_number, amount, payment_mode,
            reference_number, payment_date, collected_by, remarks)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(collection.assignment_id)
    .bind(collection.student_id)
    .bind(collection.receipt_number)
    .bind(collection.amount)
    .bind(collection.payment_mode)
    .bind(collection.reference_number)
    .bind(collection.payment_date)
    .bind(collection.collected_by)
    .bind(collection.remarks)
    .execute(conn)
    .await?;
    Ok(result.last_insert_id() as i64)
}

pub async fn find_collection(pool: &MySqlPool, id: i64) -> Result<Option<FeeCollection>, sqlx::Error> {
    sqlx::query_as::<_, FeeCollection>(&format!("SELECT {} FROM fee_collections WHERE id = ?", COLLECTION_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_collections(pool: &MySqlPool, filter: &CollectionFilter) -> Result<(Vec<FeeCollection>, i64), sqlx::Error> {
    let clause = "FROM fee_collections
         WHERE (? IS NULL OR student_id = ?)
           AND (? IS NULL OR payment_date >= ?)
           AND (? IS NULL OR payment_date <= ?)
           AND (? IS NULL OR payment_mode = ?)";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {}", clause))
        .bind(filter.student_id)
        .bind(filter.student_id)
        .bind(filter.from)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.to)
        .bind(filter.payment_mode.as_deref())
        .bind(filter.payment_mode.as_deref())
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, FeeCollection>(&format!(
        "SELECT {} {} ORDER BY payment_date DESC, id DESC LIMIT ? OFFSET ?",
        COLLECTION_COLUMNS, clause
    ))
    .bind(filter.student_id)
    .bind(filter.student_id)
    .bind(filter.from)
    .bind(filter.from)
    .bind(filter.to)
    .bind(filter.to)
    .bind(filter.payment_mode.as_deref())
    .bind(filter.payment_mode.as_deref())
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeeStructure {
    pub id: i64,
    pub school_id: i64,
    pub class_id: Option<i64>,
    pub fee_head: String,
    pub amount: Decimal,
    pub frequency: String,
    pub academic_year: String,
    pub due_day: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeeAssignment {
    pub id: i64,
    pub student_id: i64,
    pub fee_structure_id: i64,
    pub total_amount: Decimal,
    pub discount_percentage: Option<Decimal>,
    pub discount_amount: Decimal,
    pub discount_reason: Option<String>,
    pub final_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeeCollection {
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    pub receipt_number: String,
    pub amount: Decimal,
    pub payment_mode: String,
    pub reference_number: Option<String>,
    pub payment_date: NaiveDate,
    pub collected_by: i64,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

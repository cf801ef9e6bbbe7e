use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub class_id: i64,
    pub section_id: i64,
    pub attendance_date: NaiveDate,
    pub status: String,
    pub remarks: Option<String>,
    pub marked_by: i64,
}

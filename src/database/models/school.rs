use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct School {
    pub id: i64,
    pub school_name: String,
    pub school_code: String,
    pub board: Option<String>,
    pub address: Option<String>,
    pub academic_year: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClassRow {
    pub id: i64,
    pub school_id: i64,
    pub class_name: String,
    pub display_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Section {
    pub id: i64,
    pub class_id: i64,
    pub section_name: String,
    pub class_teacher_id: Option<i64>,
}

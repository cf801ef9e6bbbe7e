use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::MySqlPool;

use super::attendance_service::{percentage, AttendanceStatus};
use super::{ServiceError, ServiceResult};
use crate::repositories::{attendance as attendance_repo, message as message_repo, report as report_repo};
use crate::repositories::{student as student_repo, user as user_repo};

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub date: NaiveDate,
    pub active_students: i64,
    pub active_staff: i64,
    pub attendance_marked_today: i64,
    pub today_attendance_percentage: f64,
    pub month_collection: Decimal,
    pub outstanding_balance: Decimal,
    pub unread_messages: i64,
}

pub struct DashboardService<'a> {
    pool: &'a MySqlPool,
}

impl<'a> DashboardService<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn summary(&self, user_id: i64) -> ServiceResult<DashboardSummary> {
        let today = Utc::now().date_naive();
        let month_start = today.with_day(1).unwrap_or(today);

        let active_students = student_repo::count_active(self.pool).await?;
        let active_staff = user_repo::count_staff(self.pool).await?;

        let (mut marked, mut attended) = (0, 0);
        for (status, count) in attendance_repo::status_counts_on(self.pool, today).await? {
            let status: AttendanceStatus = status.parse().map_err(ServiceError::Internal)?;
            marked += count;
            if status.counts_as_present() {
                attended += count;
            }
        }

        Ok(DashboardSummary {
            date: today,
            active_students,
            active_staff,
            attendance_marked_today: marked,
            today_attendance_percentage: percentage(attended, marked),
            month_collection: report_repo::collected_between(self.pool, month_start, today).await?,
            outstanding_balance: report_repo::outstanding_balance(self.pool).await?,
            unread_messages: message_repo::unread_count(self.pool, user_id).await?,
        })
    }
}

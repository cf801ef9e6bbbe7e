use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::info;

use super::audit::{self, AuditTable};
use super::{ServiceError, ServiceResult};
use crate::database::is_unique_violation;
use crate::database::models::attendance::AttendanceRecord;
use crate::repositories::attendance as attendance_repo;
use crate::repositories::school as school_repo;
use crate::repositories::student as student_repo;
use crate::validation::{FieldErrors, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Leave,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::Late => "LATE",
            AttendanceStatus::Leave => "LEAVE",
        }
    }

    /// Late arrivals count as attended.
    pub fn counts_as_present(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRESENT" => Ok(AttendanceStatus::Present),
            "ABSENT" => Ok(AttendanceStatus::Absent),
            "LATE" => Ok(AttendanceStatus::Late),
            "LEAVE" => Ok(AttendanceStatus::Leave),
            other => Err(format!("unknown attendance status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentMark {
    pub student_id: i64,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkAttendanceRequest {
    pub date: NaiveDate,
    pub class_id: i64,
    pub section_id: i64,
    pub records: Vec<StudentMark>,
}

impl MarkAttendanceRequest {
    fn validate_on(&self, today: NaiveDate) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.date > today {
            errors.add("date", "cannot be in the future");
        }
        if self.records.is_empty() {
            errors.add("records", "must contain at least one student");
        }
        let mut seen = HashSet::new();
        for mark in &self.records {
            if !seen.insert(mark.student_id) {
                errors.add("records", format!("student {} is listed more than once", mark.student_id));
            }
        }
        errors.into_result()
    }
}

impl Validate for MarkAttendanceRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        self.validate_on(Utc::now().date_naive())
    }
}

/// Identifies one marking: a class section on a date.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AttendanceKey {
    pub date: NaiveDate,
    pub class_id: i64,
    pub section_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub total_days: i64,
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    pub leave: i64,
    pub attendance_percentage: f64,
}

/// Counts per status plus the share of days attended.
pub fn summarize<I>(statuses: I) -> AttendanceSummary
where
    I: IntoIterator<Item = AttendanceStatus>,
{
    let mut summary = AttendanceSummary::default();
    let mut attended = 0;
    for status in statuses {
        summary.total_days += 1;
        if status.counts_as_present() {
            attended += 1;
        }
        match status {
            AttendanceStatus::Present => summary.present += 1,
            AttendanceStatus::Absent => summary.absent += 1,
            AttendanceStatus::Late => summary.late += 1,
            AttendanceStatus::Leave => summary.leave += 1,
        }
    }
    summary.attendance_percentage = percentage(attended, summary.total_days);
    summary
}

/// `part / whole` as a percentage with two decimals; zero when `whole` is zero.
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 * 10_000.0 / whole as f64).round() / 100.0
}

#[derive(Debug, Serialize)]
pub struct AttendanceSheet {
    pub date: NaiveDate,
    pub class_id: i64,
    pub section_id: i64,
    pub records: Vec<AttendanceRecord>,
    pub summary: AttendanceSummary,
}

#[derive(Debug, Serialize)]
pub struct StudentAttendance {
    pub student_id: i64,
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(flatten)]
    pub summary: AttendanceSummary,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

fn parse_statuses(raw: &[String]) -> ServiceResult<Vec<AttendanceStatus>> {
    raw.iter()
        .map(|s| s.parse().map_err(ServiceError::Internal))
        .collect()
}

pub struct AttendanceService<'a> {
    pool: &'a MySqlPool,
}

impl<'a> AttendanceService<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }

    /// Mark a whole section for one day. A section can only be marked once
    /// per date; delete the marking to redo it.
    pub async fn mark(&self, request: MarkAttendanceRequest, actor: i64) -> ServiceResult<AttendanceSheet> {
        request.validate()?;
        let key = AttendanceKey {
            date: request.date,
            class_id: request.class_id,
            section_id: request.section_id,
        };

        if school_repo::find_section(self.pool, key.class_id, key.section_id).await?.is_none() {
            return Err(ServiceError::invalid_field("section_id", "section does not exist in this class"));
        }
        if attendance_repo::count_for_key(self.pool, key.date, key.class_id, key.section_id).await? > 0 {
            return Err(already_marked(&key));
        }

        let enrolled: HashSet<i64> = student_repo::active_ids_in_section(self.pool, key.class_id, key.section_id)
            .await?
            .into_iter()
            .collect();
        let mut errors = FieldErrors::new();
        for mark in request.records.iter().filter(|m| !enrolled.contains(&m.student_id)) {
            errors.add(
                "records",
                format!("student {} is not an active member of this section", mark.student_id),
            );
        }
        errors.into_result()?;

        let mut tx = self.pool.begin().await?;
        for mark in &request.records {
            let inserted = attendance_repo::insert(
                &mut *tx,
                mark.student_id,
                key.class_id,
                key.section_id,
                key.date,
                mark.status.as_str(),
                mark.remarks.as_deref(),
                actor,
            )
            .await;
            match inserted {
                Ok(()) => {}
                Err(e) if is_unique_violation(&e) => return Err(already_marked(&key)),
                Err(e) => return Err(e.into()),
            }
        }
        tx.commit().await?;

        audit::record(
            self.pool,
            AuditTable::Trust,
            Some(actor),
            "MARK",
            "attendance",
            None,
            Some(json!({ "date": key.date, "class_id": key.class_id, "section_id": key.section_id })),
        )
        .await;
        info!(
            "Marked attendance for class {} section {} on {} ({} students)",
            key.class_id,
            key.section_id,
            key.date,
            request.records.len()
        );

        self.get(key).await
    }

    pub async fn get(&self, key: AttendanceKey) -> ServiceResult<AttendanceSheet> {
        let records = attendance_repo::list_for_key(self.pool, key.date, key.class_id, key.section_id).await?;
        let statuses: Vec<String> = records.iter().map(|r| r.status.clone()).collect();
        let summary = summarize(parse_statuses(&statuses)?);
        Ok(AttendanceSheet {
            date: key.date,
            class_id: key.class_id,
            section_id: key.section_id,
            records,
            summary,
        })
    }

    pub async fn delete(&self, key: AttendanceKey, actor: i64) -> ServiceResult<u64> {
        let removed = attendance_repo::delete_for_key(self.pool, key.date, key.class_id, key.section_id).await?;
        if removed == 0 {
            return Err(ServiceError::not_found("Attendance"));
        }
        audit::record(
            self.pool,
            AuditTable::Trust,
            Some(actor),
            "DELETE",
            "attendance",
            None,
            Some(json!({ "date": key.date, "class_id": key.class_id, "section_id": key.section_id })),
        )
        .await;
        info!("Deleted {} attendance records for {} class {} section {}", removed, key.date, key.class_id, key.section_id);
        Ok(removed)
    }

    /// Defaults to the current month up to today.
    pub async fn student_summary(&self, student_id: i64, query: SummaryQuery) -> ServiceResult<StudentAttendance> {
        let today = Utc::now().date_naive();
        let to = query.to.unwrap_or(today);
        let from = query.from.unwrap_or_else(|| to.with_day(1).unwrap_or(to));
        if from > to {
            return Err(ServiceError::invalid_field("from", "must not be after 'to'"));
        }

        student_repo::find_by_id(self.pool, student_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Student"))?;
        let statuses = attendance_repo::statuses_for_student(self.pool, student_id, from, to).await?;

        Ok(StudentAttendance {
            student_id,
            from,
            to,
            summary: summarize(parse_statuses(&statuses)?),
        })
    }
}

fn already_marked(key: &AttendanceKey) -> ServiceError {
    ServiceError::business_rule(format!(
        "Attendance already marked for class {} section {} on {}",
        key.class_id, key.section_id, key.date
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use AttendanceStatus::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request(day: NaiveDate, records: Vec<(i64, AttendanceStatus)>) -> MarkAttendanceRequest {
        MarkAttendanceRequest {
            date: day,
            class_id: 1,
            section_id: 2,
            records: records
                .into_iter()
                .map(|(student_id, status)| StudentMark {
                    student_id,
                    status,
                    remarks: None,
                })
                .collect(),
        }
    }

    #[test]
    fn future_dates_rejected() {
        let today = date(2025, 7, 14);
        let errors = request(date(2025, 7, 15), vec![(1, Present)]).validate_on(today).unwrap_err();
        assert!(errors.contains("date"));
        assert!(request(today, vec![(1, Present)]).validate_on(today).is_ok());
    }

    #[test]
    fn duplicate_students_and_empty_lists_rejected() {
        let today = date(2025, 7, 14);
        assert!(request(today, vec![]).validate_on(today).unwrap_err().contains("records"));
        assert!(request(today, vec![(1, Present), (1, Absent)])
            .validate_on(today)
            .unwrap_err()
            .contains("records"));
    }

    #[test]
    fn summary_counts_late_as_present() {
        let summary = summarize(vec![Present, Present, Late, Absent, Leave, Present, Absent, Present]);
        assert_eq!(summary.total_days, 8);
        assert_eq!(summary.present, 4);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.absent, 2);
        assert_eq!(summary.leave, 1);
        assert_eq!(summary.attendance_percentage, 62.5);
    }

    #[test]
    fn percentage_handles_empty_and_rounding() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(summarize(Vec::new()), AttendanceSummary::default());
    }

    #[test]
    fn status_wire_names() {
        assert_eq!("LEAVE".parse::<AttendanceStatus>().unwrap(), Leave);
        assert!("HALF_DAY".parse::<AttendanceStatus>().is_err());
        assert_eq!(serde_json::to_value(Late).unwrap(), "LATE");
    }
}

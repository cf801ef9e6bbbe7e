use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::collections::BTreeMap;

use super::attendance_service::percentage;
use super::{ServiceError, ServiceResult};
use crate::repositories::report::{self as report_repo, ModeTotal, StrengthRow};

/// Longest range a single report may cover.
const MAX_REPORT_DAYS: i64 = 366;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub class_id: Option<i64>,
}

impl ReportRange {
    /// Defaults to month-to-date.
    pub fn resolve(&self, today: NaiveDate) -> ServiceResult<(NaiveDate, NaiveDate)> {
        let to = self.to.unwrap_or(today);
        let from = self.from.unwrap_or_else(|| to.with_day(1).unwrap_or(to));
        if from > to {
            return Err(ServiceError::invalid_field("from", "must not be after 'to'"));
        }
        if (to - from).num_days() >= MAX_REPORT_DAYS {
            return Err(ServiceError::invalid_field(
                "to",
                format!("report range cannot exceed {} days", MAX_REPORT_DAYS),
            ));
        }
        Ok((from, to))
    }
}

#[derive(Debug, Serialize)]
pub struct FeeCollectionReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub by_payment_mode: Vec<ModeTotal>,
    pub total_transactions: i64,
    pub total_amount: Decimal,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SectionAttendanceRow {
    pub class_id: i64,
    pub class_name: String,
    pub section_id: i64,
    pub section_name: String,
    pub total_records: i64,
    pub present_records: i64,
    pub attendance_percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct AttendanceReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub sections: Vec<SectionAttendanceRow>,
    pub overall_percentage: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StrengthReport {
    pub rows: Vec<StrengthRow>,
    pub by_gender: BTreeMap<String, i64>,
    pub total_students: i64,
}

pub fn strength_totals(rows: Vec<StrengthRow>) -> StrengthReport {
    let mut by_gender = BTreeMap::new();
    for row in &rows {
        *by_gender.entry(row.gender.clone()).or_insert(0) += row.students;
    }
    let total_students = by_gender.values().sum();
    StrengthReport {
        rows,
        by_gender,
        total_students,
    }
}

pub struct ReportService<'a> {
    pool: &'a MySqlPool,
}

impl<'a> ReportService<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn fee_collection(&self, range: ReportRange) -> ServiceResult<FeeCollectionReport> {
        let (from, to) = range.resolve(Utc::now().date_naive())?;
        let by_payment_mode = report_repo::collection_totals_by_mode(self.pool, from, to).await?;
        let total_transactions = by_payment_mode.iter().map(|m| m.transactions).sum();
        let total_amount = by_payment_mode.iter().map(|m| m.amount).sum();
        Ok(FeeCollectionReport {
            from,
            to,
            by_payment_mode,
            total_transactions,
            total_amount,
        })
    }

    pub async fn attendance(&self, range: ReportRange) -> ServiceResult<AttendanceReport> {
        let (from, to) = range.resolve(Utc::now().date_naive())?;
        let rows = report_repo::attendance_by_section(self.pool, from, to, range.class_id).await?;

        let (present, total) = rows
            .iter()
            .fold((0, 0), |(p, t), r| (p + r.present_records, t + r.total_records));
        let sections = rows
            .into_iter()
            .map(|r| SectionAttendanceRow {
                attendance_percentage: percentage(r.present_records, r.total_records),
                class_id: r.class_id,
                class_name: r.class_name,
                section_id: r.section_id,
                section_name: r.section_name,
                total_records: r.total_records,
                present_records: r.present_records,
            })
            .collect();

        Ok(AttendanceReport {
            from,
            to,
            sections,
            overall_percentage: percentage(present, total),
        })
    }

    pub async fn strength(&self) -> ServiceResult<StrengthReport> {
        Ok(strength_totals(report_repo::strength(self.pool).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn range_defaults_to_month_to_date() {
        let (from, to) = ReportRange::default().resolve(date(2025, 7, 14)).unwrap();
        assert_eq!(from, date(2025, 7, 1));
        assert_eq!(to, date(2025, 7, 14));
    }

    #[test]
    fn inverted_or_oversized_ranges_rejected() {
        let inverted = ReportRange {
            from: Some(date(2025, 7, 10)),
            to: Some(date(2025, 7, 1)),
            class_id: None,
        };
        assert!(inverted.resolve(date(2025, 7, 14)).is_err());

        let too_long = ReportRange {
            from: Some(date(2024, 1, 1)),
            to: Some(date(2025, 7, 1)),
            class_id: None,
        };
        assert!(too_long.resolve(date(2025, 7, 14)).is_err());
    }

    #[test]
    fn strength_totals_by_gender() {
        let row = |class_id, gender: &str, students| StrengthRow {
            class_id,
            class_name: format!("Class {}", class_id),
            section_id: class_id * 10,
            section_name: "A".into(),
            gender: gender.into(),
            students,
        };
        let report = strength_totals(vec![row(1, "FEMALE", 14), row(1, "MALE", 16), row(2, "FEMALE", 11)]);
        assert_eq!(report.total_students, 41);
        assert_eq!(report.by_gender["FEMALE"], 25);
        assert_eq!(report.by_gender["MALE"], 16);
    }
}

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use std::fmt;
use tracing::info;
use uuid::Uuid;

use super::audit::{self, AuditTable};
use super::{Page, ServiceError, ServiceResult};
use crate::database::is_unique_violation;
use crate::database::models::fee::{FeeAssignment, FeeCollection, FeeStructure};
use crate::repositories::fee::{self as fee_repo, CollectionFilter, NewAssignment, NewCollection, NewFeeStructure};
use crate::repositories::page_bounds;
use crate::repositories::student as student_repo;
use crate::validation::{is_academic_year, FieldErrors, Validate};

pub const FREQUENCIES: &[&str] = &["MONTHLY", "QUARTERLY", "HALF_YEARLY", "ANNUAL", "ONE_TIME"];
const PAYMENT_MODES: &[&str] = &["CASH", "CHEQUE", "CARD", "UPI", "BANK_TRANSFER", "ONLINE"];
/// Modes that must carry a cheque or transaction reference.
const REFERENCED_MODES: &[&str] = &["CHEQUE", "BANK_TRANSFER"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Partial => "PARTIAL",
            PaymentStatus::Paid => "PAID",
        }
    }

    fn for_amounts(paid: Decimal, balance: Decimal) -> Self {
        if balance <= Decimal::ZERO {
            PaymentStatus::Paid
        } else if paid > Decimal::ZERO {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discount applied to an assignment: `(percentage, amount)`.
///
/// Percentage and fixed amount are mutually exclusive. The resulting
/// amount is rounded to paise and never exceeds `total`.
pub fn compute_discount(
    total: Decimal,
    percentage: Option<Decimal>,
    fixed: Option<Decimal>,
) -> Result<(Option<Decimal>, Decimal), FieldErrors> {
    let mut errors = FieldErrors::new();
    let hundred = Decimal::from(100);

    let result = match (percentage, fixed) {
        (Some(_), Some(_)) => {
            errors.add("discount", "specify either discount_percentage or discount_amount, not both");
            (None, Decimal::ZERO)
        }
        (Some(pct), None) => {
            if pct < Decimal::ZERO || pct > hundred {
                errors.add("discount_percentage", "must be between 0 and 100");
            }
            (Some(pct), (total * pct / hundred).round_dp(2))
        }
        (None, Some(amount)) => {
            if amount < Decimal::ZERO {
                errors.add("discount_amount", "must not be negative");
            } else if amount > total {
                errors.add("discount_amount", "cannot exceed the total amount");
            }
            (None, amount.round_dp(2))
        }
        (None, None) => (None, Decimal::ZERO),
    };

    errors.into_result().map(|_| result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub paid_amount: Decimal,
    pub balance_amount: Decimal,
    pub status: PaymentStatus,
}

/// Apply one payment to an assignment's running totals. Overpayment is
/// rejected so the balance never goes negative.
pub fn apply_payment(paid: Decimal, balance: Decimal, amount: Decimal) -> ServiceResult<PaymentOutcome> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::invalid_field("amount", "must be greater than zero"));
    }
    if balance <= Decimal::ZERO {
        return Err(ServiceError::InvalidState("Fee is already fully paid".into()));
    }
    if amount > balance {
        return Err(ServiceError::business_rule(format!(
            "Payment of {} exceeds outstanding balance of {}",
            amount, balance
        )));
    }

    let paid_amount = paid + amount;
    let balance_amount = balance - amount;
    Ok(PaymentOutcome {
        paid_amount,
        balance_amount,
        status: PaymentStatus::for_amounts(paid_amount, balance_amount),
    })
}

/// `RCP-<yyyymmdd>-<8 hex>`.
pub fn receipt_number(date: NaiveDate, id: Uuid) -> String {
    let suffix: String = id.simple().to_string().chars().take(8).collect();
    format!("RCP-{}-{}", date.format("%Y%m%d"), suffix.to_ascii_uppercase())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFeeStructureRequest {
    pub school_id: i64,
    pub class_id: Option<i64>,
    pub fee_head: String,
    pub amount: Decimal,
    pub frequency: String,
    pub academic_year: String,
    pub due_day: Option<i32>,
}

/// Checks on one fee head. The onboarding fee step runs the same checks
/// before anything is provisioned.
pub fn validate_fee_head(fee_head: &str, amount: Decimal, frequency: &str, due_day: Option<i32>) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if errors.required("fee_head", fee_head) {
        errors.length("fee_head", fee_head, 2, 100);
    }
    if amount <= Decimal::ZERO {
        errors.add("amount", "must be greater than zero");
    }
    errors.one_of("frequency", frequency, FREQUENCIES);
    if matches!(due_day, Some(day) if !(1..=28).contains(&day)) {
        errors.add("due_day", "must be between 1 and 28");
    }
    errors
}

impl Validate for CreateFeeStructureRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = validate_fee_head(&self.fee_head, self.amount, &self.frequency, self.due_day);
        if !is_academic_year(&self.academic_year) {
            errors.add("academic_year", "must look like 2025-2026");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignFeeRequest {
    pub student_id: i64,
    pub fee_structure_id: i64,
    pub discount_percentage: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub discount_reason: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl Validate for AssignFeeRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        let discounted = self.discount_percentage.is_some() || self.discount_amount.is_some();
        if discounted && self.discount_reason.as_deref().map_or(true, |r| r.trim().is_empty()) {
            errors.add("discount_reason", "is required when a discount is given");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectFeeRequest {
    pub assignment_id: i64,
    pub amount: Decimal,
    pub payment_mode: String,
    pub reference_number: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub remarks: Option<String>,
}

impl Validate for CollectFeeRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.amount <= Decimal::ZERO {
            errors.add("amount", "must be greater than zero");
        }
        errors.one_of("payment_mode", &self.payment_mode, PAYMENT_MODES);
        if REFERENCED_MODES.contains(&self.payment_mode.as_str())
            && self.reference_number.as_deref().map_or(true, |r| r.trim().is_empty())
        {
            errors.add("reference_number", "is required for this payment mode");
        }
        if matches!(self.payment_date, Some(date) if date > Utc::now().date_naive()) {
            errors.add("payment_date", "cannot be in the future");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeeStructureQuery {
    pub class_id: Option<i64>,
    pub academic_year: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionQuery {
    pub student_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub payment_mode: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct Receipt {
    pub collection: FeeCollection,
    pub assignment: FeeAssignment,
}

#[derive(Debug, Serialize)]
pub struct StudentFees {
    pub student_id: i64,
    pub assignments: Vec<FeeAssignment>,
    pub total_due: Decimal,
    pub total_paid: Decimal,
    pub total_balance: Decimal,
}

pub struct FeeService<'a> {
    pool: &'a MySqlPool,
}

impl<'a> FeeService<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn create_structure(&self, request: CreateFeeStructureRequest, actor: i64) -> ServiceResult<FeeStructure> {
        request.validate()?;
        let fee = NewFeeStructure {
            school_id: request.school_id,
            class_id: request.class_id,
            fee_head: request.fee_head.trim(),
            amount: request.amount.round_dp(2),
            frequency: &request.frequency,
            academic_year: &request.academic_year,
            due_day: request.due_day,
        };
        let duplicate = || {
            ServiceError::already_exists(format!(
                "Fee head '{}' already exists for {}",
                fee.fee_head, fee.academic_year
            ))
        };
        if fee_repo::structure_exists(self.pool, fee.school_id, fee.class_id, fee.fee_head, fee.academic_year).await? {
            return Err(duplicate());
        }
        let id = match fee_repo::insert_structure(self.pool, &fee).await {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => return Err(duplicate()),
            Err(e) => return Err(e.into()),
        };
        audit::record(self.pool, AuditTable::Trust, Some(actor), "CREATE", "fee_structure", Some(id), None).await;

        fee_repo::find_structure(self.pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee structure"))
    }

    pub async fn list_structures(&self, query: FeeStructureQuery) -> ServiceResult<Vec<FeeStructure>> {
        Ok(fee_repo::list_structures(self.pool, query.class_id, query.academic_year.as_deref()).await?)
    }

    pub async fn assign_fee(&self, request: AssignFeeRequest, actor: i64) -> ServiceResult<FeeAssignment> {
        request.validate()?;

        let student = student_repo::find_by_id(self.pool, request.student_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Student"))?;
        if student.status != "ACTIVE" {
            return Err(ServiceError::business_rule("Fees can only be assigned to active students"));
        }
        let structure = fee_repo::find_structure(self.pool, request.fee_structure_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| ServiceError::not_found("Fee structure"))?;

        if fee_repo::assignment_exists(self.pool, student.id, structure.id).await? {
            return Err(ServiceError::already_exists("Fee already assigned to this student"));
        }

        let total = structure.amount;
        let (percentage, discount) = compute_discount(total, request.discount_percentage, request.discount_amount)?;
        let final_amount = total - discount;
        let status = PaymentStatus::for_amounts(Decimal::ZERO, final_amount);

        let assignment = NewAssignment {
            student_id: student.id,
            fee_structure_id: structure.id,
            total_amount: total,
            discount_percentage: percentage,
            discount_amount: discount,
            discount_reason: request.discount_reason.as_deref(),
            final_amount,
            due_date: request.due_date,
            status: status.as_str(),
        };
        let id = match fee_repo::insert_assignment(self.pool, &assignment).await {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => {
                return Err(ServiceError::already_exists("Fee already assigned to this student"));
            }
            Err(e) => return Err(e.into()),
        };

        audit::record(
            self.pool,
            AuditTable::Trust,
            Some(actor),
            "ASSIGN",
            "fee_assignment",
            Some(id),
            Some(json!({ "final_amount": final_amount, "discount": discount })),
        )
        .await;

        fee_repo::find_assignment(self.pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee assignment"))
    }

    /// Record a payment and update the assignment in one transaction.
    pub async fn collect_fee(&self, request: CollectFeeRequest, actor: i64) -> ServiceResult<Receipt> {
        request.validate()?;
        let payment_date = request.payment_date.unwrap_or_else(|| Utc::now().date_naive());
        let amount = request.amount.round_dp(2);

        let mut tx = self.pool.begin().await?;
        let assignment = fee_repo::lock_assignment(&mut *tx, request.assignment_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee assignment"))?;

        let outcome = apply_payment(assignment.paid_amount, assignment.balance_amount, amount)?;
        fee_repo::apply_payment(
            &mut *tx,
            assignment.id,
            outcome.paid_amount,
            outcome.balance_amount,
            outcome.status.as_str(),
        )
        .await?;

        let receipt = receipt_number(payment_date, Uuid::new_v4());
        let collection = NewCollection {
            assignment_id: assignment.id,
            student_id: assignment.student_id,
            receipt_number: &receipt,
            amount,
            payment_mode: &request.payment_mode,
            reference_number: request.reference_number.as_deref(),
            payment_date,
            collected_by: actor,
            remarks: request.remarks.as_deref(),
        };
        let collection_id = fee_repo::insert_collection(&mut *tx, &collection).await?;
        tx.commit().await?;

        info!(
            "Collected {} against assignment {} (receipt {}, status {})",
            amount, assignment.id, receipt, outcome.status
        );
        audit::record(
            self.pool,
            AuditTable::Trust,
            Some(actor),
            "COLLECT",
            "fee_collection",
            Some(collection_id),
            Some(json!({ "receipt_number": receipt, "amount": amount })),
        )
        .await;

        let collection = fee_repo::find_collection(self.pool, collection_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee collection"))?;
        let assignment = fee_repo::find_assignment(self.pool, assignment.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee assignment"))?;
        Ok(Receipt { collection, assignment })
    }

    pub async fn student_fees(&self, student_id: i64) -> ServiceResult<StudentFees> {
        student_repo::find_by_id(self.pool, student_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Student"))?;
        let assignments = fee_repo::list_assignments_for_student(self.pool, student_id).await?;

        let total_due = assignments.iter().map(|a| a.final_amount).sum();
        let total_paid = assignments.iter().map(|a| a.paid_amount).sum();
        let total_balance = assignments.iter().map(|a| a.balance_amount).sum();
        Ok(StudentFees {
            student_id,
            assignments,
            total_due,
            total_paid,
            total_balance,
        })
    }

    pub async fn list_collections(&self, query: CollectionQuery) -> ServiceResult<Page<FeeCollection>> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(ServiceError::invalid_field("from", "must not be after 'to'"));
            }
        }
        let (limit, offset) = page_bounds(query.page, query.limit);
        let filter = CollectionFilter {
            student_id: query.student_id,
            from: query.from,
            to: query.to,
            payment_mode: query.payment_mode,
            limit,
            offset,
        };
        let (rows, total) = fee_repo::list_collections(self.pool, &filter).await?;
        Ok(Page::new(rows, total, limit, offset))
    }
}

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use super::audit::{self, AuditTable};
use super::{Page, ServiceError, ServiceResult};
use crate::database::is_unique_violation;
use crate::database::models::school::ClassRow;
use crate::database::models::student::Student;
use crate::repositories::page_bounds;
use crate::repositories::school as school_repo;
use crate::repositories::student::{self as student_repo, NewStudent, StudentChanges, StudentFilter};
use crate::validation::{is_email, FieldErrors, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudentStatus {
    Active,
    Transferred,
    Withdrawn,
    Graduated,
}

impl StudentStatus {
    pub const ALL: &'static [&'static str] = &["ACTIVE", "TRANSFERRED", "WITHDRAWN", "GRADUATED"];

    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "ACTIVE",
            StudentStatus::Transferred => "TRANSFERRED",
            StudentStatus::Withdrawn => "WITHDRAWN",
            StudentStatus::Graduated => "GRADUATED",
        }
    }

    /// Active students can leave in any way; transferred or withdrawn
    /// students can be readmitted. Graduation is final.
    pub fn can_transition_to(&self, next: StudentStatus) -> bool {
        use StudentStatus::*;
        matches!(
            (self, next),
            (Active, Transferred) | (Active, Withdrawn) | (Active, Graduated) | (Transferred, Active) | (Withdrawn, Active)
        )
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(StudentStatus::Active),
            "TRANSFERRED" => Ok(StudentStatus::Transferred),
            "WITHDRAWN" => Ok(StudentStatus::Withdrawn),
            "GRADUATED" => Ok(StudentStatus::Graduated),
            other => Err(format!("unknown student status '{}'", other)),
        }
    }
}

const GENDERS: &[&str] = &["MALE", "FEMALE", "OTHER"];

#[derive(Debug, Clone, Deserialize)]
pub struct AdmitStudentRequest {
    pub school_id: i64,
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub class_id: i64,
    pub section_id: i64,
    pub roll_number: Option<i32>,
    pub guardian_name: String,
    pub guardian_phone: String,
    pub guardian_email: Option<String>,
    pub parent_user_id: Option<i64>,
    pub admission_date: Option<NaiveDate>,
}

fn check_phone(errors: &mut FieldErrors, field: &str, phone: &str) {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(7..=15).contains(&digits) || !phone.chars().all(|c| c.is_ascii_digit() || "+- ".contains(c)) {
        errors.add(field, "must be a valid phone number");
    }
}

impl Validate for AdmitStudentRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if errors.required("admission_number", &self.admission_number) {
            errors.length("admission_number", &self.admission_number, 1, 30);
        }
        if errors.required("first_name", &self.first_name) {
            errors.length("first_name", &self.first_name, 1, 100);
        }
        if errors.required("last_name", &self.last_name) {
            errors.length("last_name", &self.last_name, 1, 100);
        }
        errors.one_of("gender", &self.gender, GENDERS);
        if self.date_of_birth >= Utc::now().date_naive() {
            errors.add("date_of_birth", "must be in the past");
        }
        errors.required("guardian_name", &self.guardian_name);
        if errors.required("guardian_phone", &self.guardian_phone) {
            check_phone(&mut errors, "guardian_phone", &self.guardian_phone);
        }
        if let Some(email) = &self.guardian_email {
            if !is_email(email) {
                errors.add("guardian_email", "must be a valid email address");
            }
        }
        if matches!(self.roll_number, Some(n) if n <= 0) {
            errors.add("roll_number", "must be positive");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStudentRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub class_id: Option<i64>,
    pub section_id: Option<i64>,
    pub roll_number: Option<i32>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub guardian_email: Option<String>,
    pub parent_user_id: Option<i64>,
}

impl Validate for UpdateStudentRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.first_name {
            errors.length("first_name", name, 1, 100);
        }
        if let Some(name) = &self.last_name {
            errors.length("last_name", name, 1, 100);
        }
        if let Some(phone) = &self.guardian_phone {
            check_phone(&mut errors, "guardian_phone", phone);
        }
        if let Some(email) = &self.guardian_email {
            errors.email("guardian_email", email);
        }
        if self.section_id.is_some() && self.class_id.is_none() {
            errors.add("class_id", "is required when changing section");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
    pub reason: Option<String>,
}

impl Validate for ChangeStatusRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.one_of("status", &self.status, StudentStatus::ALL);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentQuery {
    pub class_id: Option<i64>,
    pub section_id: Option<i64>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub struct StudentService<'a> {
    pool: &'a MySqlPool,
}

impl<'a> StudentService<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }

    /// The class must belong to the school and the section to the class.
    async fn ensure_placement(&self, school_id: i64, class_id: i64, section_id: i64) -> ServiceResult<()> {
        let class = school_repo::find_class(self.pool, class_id)
            .await?
            .ok_or_else(|| ServiceError::invalid_field("class_id", "class does not exist"))?;
        ensure_class_in_school(&class, school_id)?;
        if school_repo::find_section(self.pool, class_id, section_id).await?.is_none() {
            return Err(ServiceError::invalid_field("section_id", "section does not exist in this class"));
        }
        Ok(())
    }

    pub async fn admit_student(&self, request: AdmitStudentRequest, actor: i64) -> ServiceResult<Student> {
        request.validate()?;
        let admission_number = request.admission_number.trim();

        if student_repo::admission_number_exists(self.pool, admission_number).await? {
            return Err(ServiceError::already_exists(format!(
                "Admission number '{}' already exists",
                admission_number
            )));
        }
        self.ensure_placement(request.school_id, request.class_id, request.section_id).await?;

        let student = NewStudent {
            school_id: request.school_id,
            admission_number,
            first_name: request.first_name.trim(),
            last_name: request.last_name.trim(),
            date_of_birth: request.date_of_birth,
            gender: &request.gender,
            class_id: request.class_id,
            section_id: request.section_id,
            roll_number: request.roll_number,
            guardian_name: request.guardian_name.trim(),
            guardian_phone: request.guardian_phone.trim(),
            guardian_email: request.guardian_email.as_deref(),
            parent_user_id: request.parent_user_id,
            admission_date: request.admission_date.unwrap_or_else(|| Utc::now().date_naive()),
        };
        let student_id = match student_repo::insert(self.pool, &student).await {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => {
                return Err(ServiceError::already_exists(format!(
                    "Admission number '{}' already exists",
                    admission_number
                )));
            }
            Err(e) => return Err(e.into()),
        };

        audit::record(
            self.pool,
            AuditTable::Trust,
            Some(actor),
            "ADMIT",
            "student",
            Some(student_id),
            Some(json!({ "admission_number": admission_number })),
        )
        .await;
        info!("Admitted student {} ({})", student_id, admission_number);

        self.get_student(student_id).await
    }

    pub async fn list_students(&self, query: StudentQuery) -> ServiceResult<Page<Student>> {
        if let Some(status) = &query.status {
            status
                .parse::<StudentStatus>()
                .map_err(|e| ServiceError::invalid_field("status", e))?;
        }
        let (limit, offset) = page_bounds(query.page, query.limit);
        let filter = StudentFilter {
            class_id: query.class_id,
            section_id: query.section_id,
            status: query.status,
            search: query.search.filter(|s| !s.trim().is_empty()),
            limit,
            offset,
        };
        let (students, total) = student_repo::list(self.pool, &filter).await?;
        Ok(Page::new(students, total, limit, offset))
    }

    pub async fn get_student(&self, student_id: i64) -> ServiceResult<Student> {
        student_repo::find_by_id(self.pool, student_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Student"))
    }

    pub async fn update_student(&self, student_id: i64, request: UpdateStudentRequest, actor: i64) -> ServiceResult<Student> {
        request.validate()?;
        let current = self.get_student(student_id).await?;

        if let Some(class_id) = request.class_id {
            let section_id = request.section_id.unwrap_or(current.section_id);
            self.ensure_placement(current.school_id, class_id, section_id).await?;
        }

        let changes = StudentChanges {
            first_name: request.first_name.map(|s| s.trim().to_string()),
            last_name: request.last_name.map(|s| s.trim().to_string()),
            class_id: request.class_id,
            section_id: request.section_id,
            roll_number: request.roll_number,
            guardian_name: request.guardian_name,
            guardian_phone: request.guardian_phone,
            guardian_email: request.guardian_email,
            parent_user_id: request.parent_user_id,
        };
        student_repo::update(self.pool, student_id, &changes).await?;
        audit::record(self.pool, AuditTable::Trust, Some(actor), "UPDATE", "student", Some(student_id), None).await;

        self.get_student(student_id).await
    }

    pub async fn change_status(&self, student_id: i64, request: ChangeStatusRequest, actor: i64) -> ServiceResult<Student> {
        request.validate()?;
        let next: StudentStatus = request
            .status
            .parse()
            .map_err(|e: String| ServiceError::invalid_field("status", e))?;

        let student = self.get_student(student_id).await?;
        let current: StudentStatus = student
            .status
            .parse()
            .map_err(ServiceError::Internal)?;

        if !current.can_transition_to(next) {
            return Err(ServiceError::InvalidState(format!(
                "Invalid status transition from {} to {}",
                current, next
            )));
        }

        student_repo::set_status(self.pool, student_id, next.as_str()).await?;
        audit::record(
            self.pool,
            AuditTable::Trust,
            Some(actor),
            "STATUS_CHANGE",
            "student",
            Some(student_id),
            Some(json!({ "from": current, "to": next, "reason": request.reason })),
        )
        .await;
        info!("Student {} status {} -> {}", student_id, current, next);

        self.get_student(student_id).await
    }
}

fn ensure_class_in_school(class: &ClassRow, school_id: i64) -> ServiceResult<()> {
    if class.school_id != school_id {
        return Err(ServiceError::invalid_field("class_id", "class does not belong to this school"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use StudentStatus::*;

    #[test]
    fn allowed_transitions() {
        assert!(Active.can_transition_to(Transferred));
        assert!(Active.can_transition_to(Withdrawn));
        assert!(Active.can_transition_to(Graduated));
        assert!(Transferred.can_transition_to(Active));
        assert!(Withdrawn.can_transition_to(Active));
    }

    #[test]
    fn rejected_transitions() {
        assert!(!Graduated.can_transition_to(Active));
        assert!(!Transferred.can_transition_to(Withdrawn));
        assert!(!Active.can_transition_to(Active));
        assert!(!Withdrawn.can_transition_to(Graduated));
    }

    fn admission() -> AdmitStudentRequest {
        AdmitStudentRequest {
            school_id: 1,
            admission_number: "GVPS-2025-001".into(),
            first_name: "Meera".into(),
            last_name: "Iyer".into(),
            date_of_birth: NaiveDate::from_ymd_opt(2015, 6, 1).unwrap(),
            gender: "FEMALE".into(),
            class_id: 3,
            section_id: 7,
            roll_number: Some(12),
            guardian_name: "Ravi Iyer".into(),
            guardian_phone: "+91 98450 12345".into(),
            guardian_email: None,
            parent_user_id: None,
            admission_date: None,
        }
    }

    #[test]
    fn class_must_belong_to_admitting_school() {
        let class = ClassRow {
            id: 3,
            school_id: 1,
            class_name: "Grade 1".into(),
            display_order: 1,
        };
        assert!(ensure_class_in_school(&class, 1).is_ok());

        let err = ensure_class_in_school(&class, 2).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref e) if e.contains("class_id")));
    }

    #[test]
    fn admission_validation() {
        assert!(admission().validate().is_ok());

        let mut bad = admission();
        bad.gender = "F".into();
        bad.guardian_phone = "call me".into();
        bad.roll_number = Some(0);
        let errors = bad.validate().unwrap_err();
        assert!(errors.contains("gender"));
        assert!(errors.contains("guardian_phone"));
        assert!(errors.contains("roll_number"));
    }
}

// Service-level tests against a real MySQL server.
// Run with ERP_TEST_MYSQL=1 and MASTER_DB_* pointing at a disposable server.

mod common;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use school_erp_api::database::models::trust::Trust;
use school_erp_api::services::attendance_service::{AttendanceService, AttendanceStatus, MarkAttendanceRequest, StudentMark};
use school_erp_api::services::fee_service::{CreateFeeStructureRequest, FeeService};
use school_erp_api::services::student_service::{AdmitStudentRequest, StudentService};
use school_erp_api::services::trust_service::{ClassSpec, CreateSchoolRequest, CreateTrustRequest};
use school_erp_api::services::ServiceError;
use school_erp_api::state::AppState;

const ACTOR: i64 = 1;

fn trust_request(code: &str, subdomain: &str) -> CreateTrustRequest {
    CreateTrustRequest {
        trust_name: "Integration Test Trust".into(),
        trust_code: code.into(),
        subdomain: subdomain.into(),
        contact_email: "office@example.edu".into(),
        contact_phone: None,
        address: None,
    }
}

fn school_request(code: &str, classes: Vec<ClassSpec>) -> CreateSchoolRequest {
    CreateSchoolRequest {
        school_name: "Integration Public School".into(),
        school_code: code.into(),
        board: None,
        address: None,
        academic_year: "2025-2026".into(),
        classes,
    }
}

fn class(name: &str, sections: &[&str]) -> ClassSpec {
    ClassSpec {
        class_name: name.into(),
        sections: sections.iter().map(|s| s.to_string()).collect(),
    }
}

fn admission(number: &str, school_id: i64, class_id: i64, section_id: i64) -> AdmitStudentRequest {
    AdmitStudentRequest {
        school_id,
        admission_number: number.into(),
        first_name: "Meera".into(),
        last_name: "Iyer".into(),
        date_of_birth: NaiveDate::from_ymd_opt(2015, 6, 1).unwrap(),
        gender: "FEMALE".into(),
        class_id,
        section_id,
        roll_number: Some(1),
        guardian_name: "Ravi Iyer".into(),
        guardian_phone: "+91 98450 12345".into(),
        guardian_email: None,
        parent_user_id: None,
        admission_date: None,
    }
}

async fn new_trust(state: &AppState) -> Result<Trust> {
    let suffix = common::unique_suffix();
    let trust = state
        .trust_service()
        .create_trust(trust_request(&format!("T{}", suffix.to_uppercase()), &format!("t-{}", suffix)), None)
        .await?;
    Ok(trust)
}

#[tokio::test]
async fn duplicate_trust_code_or_subdomain_writes_no_row() -> Result<()> {
    let Some(state) = common::mysql_state().await? else {
        return Ok(());
    };
    let trusts = state.trust_service();
    let existing = new_trust(&state).await?;
    let before = trusts.list_trusts().await?.len();

    let other = common::unique_suffix();
    let same_code = trusts
        .create_trust(trust_request(&existing.trust_code, &format!("t-{}", other)), None)
        .await;
    assert!(matches!(same_code, Err(ServiceError::AlreadyExists(ref m)) if m.contains("Trust code")));

    let same_subdomain = trusts
        .create_trust(trust_request(&format!("T{}", other.to_uppercase()), &existing.subdomain), None)
        .await;
    assert!(matches!(same_subdomain, Err(ServiceError::AlreadyExists(ref m)) if m.contains("Subdomain")));

    assert_eq!(trusts.list_trusts().await?.len(), before);
    Ok(())
}

#[tokio::test]
async fn section_cannot_be_marked_twice_for_a_day() -> Result<()> {
    let Some(state) = common::mysql_state().await? else {
        return Ok(());
    };
    let trust = new_trust(&state).await?;
    let trusts = state.trust_service();
    let school = trusts
        .create_school(trust.id, school_request("IPS", vec![class("Grade 1", &["A"])]))
        .await?;
    let classes = trusts.list_classes(trust.id, school.id).await?;
    let (class_id, section_id) = (classes[0].class.id, classes[0].sections[0].id);

    let conn = state.connections.trust(trust.id).await?;
    let student = StudentService::new(&conn.conn)
        .admit_student(admission("IPS-001", school.id, class_id, section_id), ACTOR)
        .await?;

    let attendance = AttendanceService::new(&conn.conn);
    let request = MarkAttendanceRequest {
        date: Utc::now().date_naive(),
        class_id,
        section_id,
        records: vec![StudentMark {
            student_id: student.id,
            status: AttendanceStatus::Present,
            remarks: None,
        }],
    };
    attendance.mark(request.clone(), ACTOR).await?;

    let again = attendance.mark(request, ACTOR).await;
    assert!(matches!(again, Err(ServiceError::BusinessRule(ref m)) if m.contains("already marked")));
    Ok(())
}

#[tokio::test]
async fn duplicate_class_names_leave_no_school_behind() -> Result<()> {
    let Some(state) = common::mysql_state().await? else {
        return Ok(());
    };
    let trust = new_trust(&state).await?;
    let trusts = state.trust_service();

    let result = trusts
        .create_school(
            trust.id,
            school_request("IPS", vec![class("Grade 1", &["A", "A"]), class("Grade 1", &[])]),
        )
        .await;
    assert!(matches!(result, Err(ServiceError::Validation(ref e)) if e.contains("classes[1].class_name")));
    assert!(trusts.list_schools(trust.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn admission_rejects_class_of_another_school() -> Result<()> {
    let Some(state) = common::mysql_state().await? else {
        return Ok(());
    };
    let trust = new_trust(&state).await?;
    let trusts = state.trust_service();
    let first = trusts
        .create_school(trust.id, school_request("IPS", vec![class("Grade 1", &["A"])]))
        .await?;
    let second = trusts.create_school(trust.id, school_request("IPS_TWO", vec![])).await?;
    let classes = trusts.list_classes(trust.id, first.id).await?;

    let conn = state.connections.trust(trust.id).await?;
    let result = StudentService::new(&conn.conn)
        .admit_student(
            admission("IPS-002", second.id, classes[0].class.id, classes[0].sections[0].id),
            ACTOR,
        )
        .await;
    assert!(matches!(result, Err(ServiceError::Validation(ref e)) if e.contains("class_id")));
    Ok(())
}

#[tokio::test]
async fn school_wide_fee_head_is_unique_per_year() -> Result<()> {
    let Some(state) = common::mysql_state().await? else {
        return Ok(());
    };
    let trust = new_trust(&state).await?;
    let school = state
        .trust_service()
        .create_school(trust.id, school_request("IPS", vec![]))
        .await?;
    let conn = state.connections.trust(trust.id).await?;
    let fees = FeeService::new(&conn.conn);

    let request = CreateFeeStructureRequest {
        school_id: school.id,
        class_id: None,
        fee_head: "Tuition".into(),
        amount: Decimal::new(150_000, 2),
        frequency: "MONTHLY".into(),
        academic_year: "2025-2026".into(),
        due_day: Some(10),
    };
    fees.create_structure(request.clone(), ACTOR).await?;

    let again = fees.create_structure(request, ACTOR).await;
    assert!(matches!(again, Err(ServiceError::AlreadyExists(_))));
    Ok(())
}

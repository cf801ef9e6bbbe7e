//! Trust onboarding wizard: trust, admin, school, classes, optional fees.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::engine::{StepDefinition, StepPayload, WizardDefinition, WizardError, WizardSession};
use crate::services::fee_service::{validate_fee_head, CreateFeeStructureRequest};
use crate::services::trust_service::{validate_classes, ClassSpec, CreateSchoolRequest, CreateTrustRequest};
use crate::validation::{is_academic_year, is_code, FieldErrors, Validate};
use std::collections::HashSet;

pub const TRUST_DETAILS: &str = "trust_details";
pub const ADMIN_ACCOUNT: &str = "admin_account";
pub const SCHOOL_DETAILS: &str = "school_details";
pub const ACADEMIC_SETUP: &str = "academic_setup";
pub const FEE_SETUP: &str = "fee_setup";
pub const REVIEW: &str = "review";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAccount {
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolDetails {
    pub school_name: String,
    pub school_code: String,
    pub board: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicSetup {
    pub academic_year: String,
    pub classes: Vec<ClassSpec>,
    #[serde(default = "default_true")]
    pub enable_fees: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeHead {
    pub fee_head: String,
    pub amount: Decimal,
    pub frequency: String,
    pub due_day: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSetup {
    pub fee_heads: Vec<FeeHead>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub confirm: bool,
}

fn default_true() -> bool {
    true
}

/// One variant per step. Serialized without a tag; the step id is the key
/// the payload is stored under.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OnboardingPayload {
    TrustDetails(CreateTrustRequest),
    AdminAccount(AdminAccount),
    SchoolDetails(SchoolDetails),
    AcademicSetup(AcademicSetup),
    FeeSetup(FeeSetup),
    Review(Review),
}

impl OnboardingPayload {
    /// Decode raw JSON as the payload type of `step_id`.
    pub fn from_step(step_id: &str, data: Value) -> Result<Self, WizardError> {
        fn decode<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, WizardError> {
            serde_json::from_value(data).map_err(|e| {
                let mut errors = FieldErrors::new();
                errors.add("payload", e.to_string());
                WizardError::Validation(errors)
            })
        }

        Ok(match step_id {
            TRUST_DETAILS => OnboardingPayload::TrustDetails(decode(data)?),
            ADMIN_ACCOUNT => OnboardingPayload::AdminAccount(decode(data)?),
            SCHOOL_DETAILS => OnboardingPayload::SchoolDetails(decode(data)?),
            ACADEMIC_SETUP => OnboardingPayload::AcademicSetup(decode(data)?),
            FEE_SETUP => OnboardingPayload::FeeSetup(decode(data)?),
            REVIEW => OnboardingPayload::Review(decode(data)?),
            other => return Err(WizardError::UnknownStep(other.to_string())),
        })
    }
}

impl StepPayload for OnboardingPayload {
    fn step_id(&self) -> &'static str {
        match self {
            OnboardingPayload::TrustDetails(_) => TRUST_DETAILS,
            OnboardingPayload::AdminAccount(_) => ADMIN_ACCOUNT,
            OnboardingPayload::SchoolDetails(_) => SCHOOL_DETAILS,
            OnboardingPayload::AcademicSetup(_) => ACADEMIC_SETUP,
            OnboardingPayload::FeeSetup(_) => FEE_SETUP,
            OnboardingPayload::Review(_) => REVIEW,
        }
    }

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        match self {
            OnboardingPayload::TrustDetails(trust) => return trust.validate(),
            OnboardingPayload::AdminAccount(admin) => {
                if errors.required("full_name", &admin.full_name) {
                    errors.length("full_name", &admin.full_name, 2, 200);
                }
                if errors.required("email", &admin.email) {
                    errors.email("email", &admin.email);
                }
                if errors.required("password", &admin.password) {
                    errors.length("password", &admin.password, 8, 128);
                }
            }
            OnboardingPayload::SchoolDetails(school) => {
                if errors.required("school_name", &school.school_name) {
                    errors.length("school_name", &school.school_name, 3, 200);
                }
                if errors.required("school_code", &school.school_code) && !is_code(school.school_code.trim()) {
                    errors.add("school_code", "must contain only uppercase letters, digits and underscores");
                }
            }
            OnboardingPayload::AcademicSetup(academic) => {
                if !is_academic_year(&academic.academic_year) {
                    errors.add("academic_year", "must look like 2025-2026");
                }
                if academic.classes.is_empty() {
                    errors.add("classes", "must contain at least one class");
                }
                errors.merge("", validate_classes(&academic.classes));
            }
            OnboardingPayload::FeeSetup(fees) => {
                if fees.fee_heads.is_empty() {
                    errors.add("fee_heads", "must contain at least one fee head");
                }
                let mut names = HashSet::new();
                for (i, head) in fees.fee_heads.iter().enumerate() {
                    let prefix = format!("fee_heads[{}].", i);
                    errors.merge(&prefix, validate_fee_head(&head.fee_head, head.amount, &head.frequency, head.due_day));
                    if !head.fee_head.trim().is_empty() && !names.insert(head.fee_head.trim().to_lowercase()) {
                        errors.add(format!("{}fee_head", prefix), "is listed more than once");
                    }
                }
            }
            OnboardingPayload::Review(review) => {
                if !review.confirm {
                    errors.add("confirm", "must be true to finish onboarding");
                }
            }
        }
        errors.into_result()
    }
}

fn fees_disabled(session: &WizardSession<OnboardingPayload>) -> bool {
    matches!(
        session.payload(ACADEMIC_SETUP),
        Some(OnboardingPayload::AcademicSetup(academic)) if !academic.enable_fees
    )
}

pub fn definition(timeout_minutes: i64) -> WizardDefinition<OnboardingPayload> {
    WizardDefinition {
        id: "trust_onboarding",
        steps: vec![
            StepDefinition {
                id: TRUST_DETAILS,
                title: "Trust details",
                depends_on: &[],
                optional: false,
                skip_when: None,
            },
            StepDefinition {
                id: ADMIN_ACCOUNT,
                title: "Administrator account",
                depends_on: &[TRUST_DETAILS],
                optional: false,
                skip_when: None,
            },
            StepDefinition {
                id: SCHOOL_DETAILS,
                title: "First school",
                depends_on: &[TRUST_DETAILS],
                optional: false,
                skip_when: None,
            },
            StepDefinition {
                id: ACADEMIC_SETUP,
                title: "Academic year and classes",
                depends_on: &[SCHOOL_DETAILS],
                optional: false,
                skip_when: None,
            },
            StepDefinition {
                id: FEE_SETUP,
                title: "Fee structure",
                depends_on: &[ACADEMIC_SETUP],
                optional: true,
                skip_when: Some(fees_disabled),
            },
            StepDefinition {
                id: REVIEW,
                title: "Review and create",
                depends_on: &[ADMIN_ACCOUNT, ACADEMIC_SETUP],
                optional: false,
                skip_when: None,
            },
        ],
        timeout: Duration::minutes(timeout_minutes),
    }
}

/// Everything collected by a finished session, ready for provisioning.
#[derive(Debug, Clone)]
pub struct OnboardingPlan {
    pub trust: CreateTrustRequest,
    pub admin: AdminAccount,
    pub school: SchoolDetails,
    pub academic: AcademicSetup,
    pub fees: Option<FeeSetup>,
}

impl OnboardingPlan {
    pub fn school_request(&self) -> CreateSchoolRequest {
        CreateSchoolRequest {
            school_name: self.school.school_name.clone(),
            school_code: self.school.school_code.clone(),
            board: self.school.board.clone(),
            address: self.school.address.clone(),
            academic_year: self.academic.academic_year.clone(),
            classes: self.academic.classes.clone(),
        }
    }

    /// School-wide fee structures for the new school.
    pub fn fee_requests(&self, school_id: i64) -> Vec<CreateFeeStructureRequest> {
        self.fees
            .iter()
            .flat_map(|fees| &fees.fee_heads)
            .map(|head| CreateFeeStructureRequest {
                school_id,
                class_id: None,
                fee_head: head.fee_head.clone(),
                amount: head.amount,
                frequency: head.frequency.clone(),
                academic_year: self.academic.academic_year.clone(),
                due_day: head.due_day,
            })
            .collect()
    }

    pub fn from_session(session: &WizardSession<OnboardingPayload>) -> Option<Self> {
        let trust = match session.payload(TRUST_DETAILS)? {
            OnboardingPayload::TrustDetails(t) => t.clone(),
            _ => return None,
        };
        let admin = match session.payload(ADMIN_ACCOUNT)? {
            OnboardingPayload::AdminAccount(a) => a.clone(),
            _ => return None,
        };
        let school = match session.payload(SCHOOL_DETAILS)? {
            OnboardingPayload::SchoolDetails(s) => s.clone(),
            _ => return None,
        };
        let academic = match session.payload(ACADEMIC_SETUP)? {
            OnboardingPayload::AcademicSetup(a) => a.clone(),
            _ => return None,
        };
        let fees = match session.payload(FEE_SETUP) {
            Some(OnboardingPayload::FeeSetup(f)) if academic.enable_fees => Some(f.clone()),
            _ => None,
        };
        Some(Self {
            trust,
            admin,
            school,
            academic,
            fees,
        })
    }
}

/// Every request provisioning will make, checked before the first write.
impl Validate for OnboardingPlan {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut steps = vec![
            OnboardingPayload::TrustDetails(self.trust.clone()),
            OnboardingPayload::AdminAccount(self.admin.clone()),
            OnboardingPayload::SchoolDetails(self.school.clone()),
            OnboardingPayload::AcademicSetup(self.academic.clone()),
        ];
        steps.extend(self.fees.clone().map(OnboardingPayload::FeeSetup));
        for step in steps {
            if let Err(e) = step.validate() {
                errors.merge(&format!("{}.", step.step_id()), e);
            }
        }
        if let Err(e) = self.school_request().validate() {
            errors.merge(&format!("{}.", SCHOOL_DETAILS), e);
        }
        for (i, request) in self.fee_requests(0).iter().enumerate() {
            if let Err(e) = request.validate() {
                errors.merge(&format!("{}.fee_heads[{}].", FEE_SETUP, i), e);
            }
        }
        errors.into_result()
    }
}

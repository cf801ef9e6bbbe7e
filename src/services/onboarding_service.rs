use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use super::fee_service::FeeService;
use super::trust_service::TrustService;
use super::{ServiceError, ServiceResult};
use crate::auth::{hash_password, Role};
use crate::database::models::school::School;
use crate::database::models::trust::Trust;
use crate::database::ConnectionManager;
use crate::repositories::user::{self as user_repo, NewUser};
use crate::validation::Validate;
use crate::wizard::onboarding::{self, OnboardingPayload, OnboardingPlan};
use crate::wizard::{StepView, WizardDefinition, WizardSession, WizardSessions};

#[derive(Debug, Serialize)]
pub struct ProvisionedTrust {
    pub trust: Trust,
    pub school: School,
    pub admin_user_id: i64,
    pub fee_structures: usize,
}

#[derive(Debug, Serialize)]
pub struct WizardState {
    #[serde(flatten)]
    pub session: WizardSession<OnboardingPayload>,
    pub steps: Vec<StepView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned: Option<ProvisionedTrust>,
}

/// Drives the onboarding wizard for system administrators and provisions
/// the trust once every step is done.
pub struct OnboardingService {
    wizard: WizardDefinition<OnboardingPayload>,
    sessions: Arc<WizardSessions<OnboardingPayload>>,
    connections: Arc<ConnectionManager>,
    trusts: TrustService,
}

impl OnboardingService {
    pub fn new(
        timeout_minutes: i64,
        sessions: Arc<WizardSessions<OnboardingPayload>>,
        connections: Arc<ConnectionManager>,
        trusts: TrustService,
    ) -> Self {
        Self {
            wizard: onboarding::definition(timeout_minutes),
            sessions,
            connections,
            trusts,
        }
    }

    fn view(&self, session: WizardSession<OnboardingPayload>, provisioned: Option<ProvisionedTrust>) -> WizardState {
        WizardState {
            steps: self.wizard.steps_view(&session),
            session,
            provisioned,
        }
    }

    pub async fn state(&self, user_id: i64, now: DateTime<Utc>) -> WizardState {
        let session = self.sessions.current(&self.wizard, user_id, now).await;
        self.view(session, None)
    }

    pub async fn reset(&self, user_id: i64, now: DateTime<Utc>) -> WizardState {
        let session = self.sessions.reset(&self.wizard, user_id, now).await;
        info!("Onboarding wizard reset for system user {}", user_id);
        self.view(session, None)
    }

    pub async fn submit(&self, user_id: i64, step_id: &str, data: Value, now: DateTime<Utc>) -> ServiceResult<WizardState> {
        let mut session = self.sessions.current(&self.wizard, user_id, now).await;
        let payload = OnboardingPayload::from_step(step_id, data)?;

        let outcome = self.wizard.complete_step(&mut session, step_id, payload, now);
        if let Err(e) = outcome {
            self.sessions.save(user_id, session).await;
            return Err(e.into());
        }
        if !session.is_complete {
            self.sessions.save(user_id, session.clone()).await;
            return Ok(self.view(session, None));
        }

        match self.provision(&session, user_id).await {
            Ok(provisioned) => {
                self.sessions.remove(user_id).await;
                Ok(self.view(session, Some(provisioned)))
            }
            Err(e) => {
                error!("Onboarding provisioning failed for system user {}: {}", user_id, e);
                self.wizard.reopen(&mut session, step_id)?;
                self.sessions.save(user_id, session).await;
                Err(e)
            }
        }
    }

    async fn provision(&self, session: &WizardSession<OnboardingPayload>, actor: i64) -> ServiceResult<ProvisionedTrust> {
        let plan = OnboardingPlan::from_session(session)
            .ok_or_else(|| ServiceError::Internal("completed wizard is missing step data".into()))?;

        // Nothing is written unless every request below would be accepted
        plan.validate()?;
        let email = plan.admin.email.trim().to_ascii_lowercase();
        let password_hash = hash_password(plan.admin.password.clone()).await?;

        let trust = self.trusts.create_trust(plan.trust.clone(), Some(actor)).await?;
        let school = self.trusts.create_school(trust.id, plan.school_request()).await?;

        let trust_conn = self.connections.trust(trust.id).await?;
        let pool = trust_conn.conn.as_ref();
        let admin_user_id = user_repo::insert(
            pool,
            &NewUser {
                school_id: Some(school.id),
                email: &email,
                password_hash: &password_hash,
                full_name: plan.admin.full_name.trim(),
                phone: plan.admin.phone.as_deref(),
                role: Role::TrustAdmin.as_str(),
            },
        )
        .await?;

        let fee_service = FeeService::new(pool);
        let fee_requests = plan.fee_requests(school.id);
        let fee_structures = fee_requests.len();
        for request in fee_requests {
            fee_service.create_structure(request, admin_user_id).await?;
        }

        info!(
            "Onboarded trust {} ({}) with school {} and admin user {}",
            trust.id, trust.trust_code, school.id, admin_user_id
        );
        Ok(ProvisionedTrust {
            trust,
            school,
            admin_user_id,
            fee_structures,
        })
    }
}

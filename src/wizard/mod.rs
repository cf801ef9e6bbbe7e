pub mod engine;
pub mod onboarding;

pub use engine::{StepPayload, StepState, StepView, WizardDefinition, WizardError, WizardSession};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory sessions keyed by the owning user id.
pub struct WizardSessions<P> {
    sessions: Mutex<HashMap<i64, WizardSession<P>>>,
}

impl<P> Default for WizardSessions<P> {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl<P: StepPayload> WizardSessions<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The user's session, started or reset for idleness as needed.
    pub async fn current(&self, wizard: &WizardDefinition<P>, user_id: i64, now: DateTime<Utc>) -> WizardSession<P> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(user_id).or_insert_with(|| wizard.start(now));
        wizard.expire_if_idle(session, now);
        session.clone()
    }

    pub async fn save(&self, user_id: i64, session: WizardSession<P>) {
        self.sessions.lock().await.insert(user_id, session);
    }

    pub async fn reset(&self, wizard: &WizardDefinition<P>, user_id: i64, now: DateTime<Utc>) -> WizardSession<P> {
        let session = wizard.start(now);
        self.sessions.lock().await.insert(user_id, session.clone());
        session
    }

    pub async fn remove(&self, user_id: i64) -> Option<WizardSession<P>> {
        self.sessions.lock().await.remove(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::onboarding::{self, OnboardingPayload, TRUST_DETAILS};
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn sessions_are_per_user_and_expire() {
        let wizard = onboarding::definition(30);
        let store: WizardSessions<OnboardingPayload> = WizardSessions::new();
        let t0 = Utc::now();

        let mut session = store.current(&wizard, 1, t0).await;
        let payload = OnboardingPayload::from_step(
            TRUST_DETAILS,
            json!({
                "trust_name": "Green Valley Trust",
                "trust_code": "GVT",
                "subdomain": "greenvalley",
                "contact_email": "office@gvt.edu"
            }),
        )
        .unwrap();
        wizard.complete_step(&mut session, TRUST_DETAILS, payload, t0).unwrap();
        store.save(1, session).await;

        assert!(store.current(&wizard, 1, t0).await.is_completed(TRUST_DETAILS));
        assert!(!store.current(&wizard, 2, t0).await.is_completed(TRUST_DETAILS));

        let later = t0 + Duration::minutes(45);
        assert!(!store.current(&wizard, 1, later).await.is_completed(TRUST_DETAILS));
    }

    #[tokio::test]
    async fn reset_starts_over() {
        let wizard = onboarding::definition(30);
        let store: WizardSessions<OnboardingPayload> = WizardSessions::new();
        let now = Utc::now();
        let session = store.reset(&wizard, 7, now).await;
        assert_eq!(session.current_step, Some(TRUST_DETAILS));
        assert!(store.remove(7).await.is_some());
        assert!(store.remove(7).await.is_none());
    }
}

//! Generic multi-step wizard: ordered steps gated by dependencies, optional
//! steps with skip conditions, and idle-timeout reset. Time is passed in by
//! the caller.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::validation::FieldErrors;

/// Typed data submitted for one step. Each variant belongs to exactly one step.
pub trait StepPayload: Clone + Send + Sync + Serialize {
    fn step_id(&self) -> &'static str;

    fn validate(&self) -> Result<(), FieldErrors>;
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("Unknown wizard step '{0}'")]
    UnknownStep(String),

    #[error("Step '{step}' is not accessible until {} are completed", .missing.join(", "))]
    StepNotAccessible { step: String, missing: Vec<String> },

    #[error("Payload for step '{got}' cannot be stored under step '{expected}'")]
    PayloadMismatch { expected: String, got: String },

    #[error("Invalid data for step: {0}")]
    Validation(FieldErrors),

    #[error("Wizard is already complete")]
    AlreadyComplete,
}

pub type SkipCondition<P> = fn(&WizardSession<P>) -> bool;

pub struct StepDefinition<P> {
    pub id: &'static str,
    pub title: &'static str,
    pub depends_on: &'static [&'static str],
    pub optional: bool,
    /// Only consulted for optional steps.
    pub skip_when: Option<SkipCondition<P>>,
}

pub struct WizardDefinition<P> {
    pub id: &'static str,
    pub steps: Vec<StepDefinition<P>>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct WizardSession<P> {
    pub wizard_id: &'static str,
    pub current_step: Option<&'static str>,
    pub completed_steps: BTreeSet<&'static str>,
    pub data: BTreeMap<&'static str, P>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_complete: bool,
}

impl<P> WizardSession<P> {
    pub fn is_completed(&self, step_id: &str) -> bool {
        self.completed_steps.contains(step_id)
    }

    pub fn payload(&self, step_id: &str) -> Option<&P> {
        self.data.get(step_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Completed,
    Current,
    Available,
    Locked,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub id: &'static str,
    pub title: &'static str,
    pub optional: bool,
    pub state: StepState,
}

impl<P: StepPayload> WizardDefinition<P> {
    pub fn start(&self, now: DateTime<Utc>) -> WizardSession<P> {
        WizardSession {
            wizard_id: self.id,
            current_step: self.steps.first().map(|s| s.id),
            completed_steps: BTreeSet::new(),
            data: BTreeMap::new(),
            started_at: now,
            last_activity: now,
            is_complete: false,
        }
    }

    fn step(&self, step_id: &str) -> Result<&StepDefinition<P>, WizardError> {
        self.steps
            .iter()
            .find(|s| s.id == step_id)
            .ok_or_else(|| WizardError::UnknownStep(step_id.to_string()))
    }

    /// Replace an idle session with a fresh one. Returns whether it reset.
    pub fn expire_if_idle(&self, session: &mut WizardSession<P>, now: DateTime<Utc>) -> bool {
        if now - session.last_activity > self.timeout {
            *session = self.start(now);
            return true;
        }
        false
    }

    pub fn is_skipped(&self, session: &WizardSession<P>, step: &StepDefinition<P>) -> bool {
        step.optional && step.skip_when.map_or(false, |skip| skip(session))
    }

    fn missing_dependencies(&self, session: &WizardSession<P>, step: &StepDefinition<P>) -> Vec<String> {
        step.depends_on
            .iter()
            .filter(|dep| !session.is_completed(dep))
            .map(|dep| dep.to_string())
            .collect()
    }

    pub fn check_accessible(&self, session: &WizardSession<P>, step_id: &str) -> Result<(), WizardError> {
        let step = self.step(step_id)?;
        let missing = self.missing_dependencies(session, step);
        if !missing.is_empty() {
            return Err(WizardError::StepNotAccessible {
                step: step.id.to_string(),
                missing,
            });
        }
        Ok(())
    }

    /// First incomplete, non-skipped step whose dependencies are met.
    pub fn next_step(&self, session: &WizardSession<P>) -> Option<&'static str> {
        self.steps
            .iter()
            .filter(|s| !session.is_completed(s.id) && !self.is_skipped(session, s))
            .find(|s| self.missing_dependencies(session, s).is_empty())
            .map(|s| s.id)
    }

    fn all_done(&self, session: &WizardSession<P>) -> bool {
        self.steps
            .iter()
            .all(|s| session.is_completed(s.id) || self.is_skipped(session, s))
    }

    /// Validate and store `payload` under `step_id`, then advance.
    /// Completed steps may be resubmitted until the wizard finishes.
    pub fn complete_step(
        &self,
        session: &mut WizardSession<P>,
        step_id: &str,
        payload: P,
        now: DateTime<Utc>,
    ) -> Result<(), WizardError> {
        self.expire_if_idle(session, now);
        if session.is_complete {
            return Err(WizardError::AlreadyComplete);
        }

        let step = self.step(step_id)?;
        if payload.step_id() != step.id {
            return Err(WizardError::PayloadMismatch {
                expected: step.id.to_string(),
                got: payload.step_id().to_string(),
            });
        }
        self.check_accessible(session, step.id)?;
        payload.validate().map_err(WizardError::Validation)?;

        session.data.insert(step.id, payload);
        session.completed_steps.insert(step.id);
        session.last_activity = now;

        if self.all_done(session) {
            session.is_complete = true;
            session.current_step = None;
        } else {
            session.current_step = self.next_step(session);
        }
        Ok(())
    }

    /// Undo completion of one step, e.g. when finishing the wizard failed.
    pub fn reopen(&self, session: &mut WizardSession<P>, step_id: &str) -> Result<(), WizardError> {
        let step = self.step(step_id)?;
        session.completed_steps.remove(step.id);
        session.is_complete = false;
        session.current_step = self.next_step(session);
        Ok(())
    }

    pub fn steps_view(&self, session: &WizardSession<P>) -> Vec<StepView> {
        self.steps
            .iter()
            .map(|s| {
                let state = if session.is_completed(s.id) {
                    StepState::Completed
                } else if self.is_skipped(session, s) {
                    StepState::Skipped
                } else if session.current_step == Some(s.id) {
                    StepState::Current
                } else if self.missing_dependencies(session, s).is_empty() {
                    StepState::Available
                } else {
                    StepState::Locked
                };
                StepView {
                    id: s.id,
                    title: s.title,
                    optional: s.optional,
                    state,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    struct Note {
        step: &'static str,
        text: String,
    }

    impl StepPayload for Note {
        fn step_id(&self) -> &'static str {
            self.step
        }

        fn validate(&self) -> Result<(), FieldErrors> {
            let mut errors = FieldErrors::new();
            errors.required("text", &self.text);
            errors.into_result()
        }
    }

    fn note(step: &'static str, text: &str) -> Note {
        Note { step, text: text.into() }
    }

    fn skip_extras(session: &WizardSession<Note>) -> bool {
        session.payload("basics").map_or(false, |n| n.text == "no extras")
    }

    fn definition() -> WizardDefinition<Note> {
        WizardDefinition {
            id: "test",
            steps: vec![
                StepDefinition { id: "basics", title: "Basics", depends_on: &[], optional: false, skip_when: None },
                StepDefinition { id: "extras", title: "Extras", depends_on: &["basics"], optional: true, skip_when: Some(skip_extras) },
                StepDefinition { id: "confirm", title: "Confirm", depends_on: &["basics"], optional: false, skip_when: None },
            ],
            timeout: Duration::minutes(30),
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-07-14T09:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn starts_on_first_step() {
        let session = definition().start(t0());
        assert_eq!(session.current_step, Some("basics"));
        assert!(!session.is_complete);
    }

    #[test]
    fn step_with_unmet_dependencies_is_rejected() {
        let wizard = definition();
        let mut session = wizard.start(t0());
        let err = wizard.complete_step(&mut session, "confirm", note("confirm", "ok"), t0()).unwrap_err();
        match err {
            WizardError::StepNotAccessible { step, missing } => {
                assert_eq!(step, "confirm");
                assert_eq!(missing, vec!["basics".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(session.completed_steps.is_empty());
    }

    #[test]
    fn advances_and_completes_with_no_next_step() {
        let wizard = definition();
        let mut session = wizard.start(t0());

        wizard.complete_step(&mut session, "basics", note("basics", "hello"), t0()).unwrap();
        assert_eq!(session.current_step, Some("extras"));

        wizard.complete_step(&mut session, "extras", note("extras", "more"), t0()).unwrap();
        assert_eq!(session.current_step, Some("confirm"));

        wizard.complete_step(&mut session, "confirm", note("confirm", "yes"), t0()).unwrap();
        assert!(session.is_complete);
        assert_eq!(session.current_step, None);
        assert!(matches!(
            wizard.complete_step(&mut session, "confirm", note("confirm", "again"), t0()),
            Err(WizardError::AlreadyComplete)
        ));
    }

    #[test]
    fn skipped_optional_step_does_not_block_completion() {
        let wizard = definition();
        let mut session = wizard.start(t0());

        wizard.complete_step(&mut session, "basics", note("basics", "no extras"), t0()).unwrap();
        assert_eq!(session.current_step, Some("confirm"));

        wizard.complete_step(&mut session, "confirm", note("confirm", "yes"), t0()).unwrap();
        assert!(session.is_complete);
        let states: Vec<StepState> = wizard.steps_view(&session).into_iter().map(|s| s.state).collect();
        assert_eq!(states, vec![StepState::Completed, StepState::Skipped, StepState::Completed]);
    }

    #[test]
    fn invalid_or_mismatched_payloads_are_not_stored() {
        let wizard = definition();
        let mut session = wizard.start(t0());

        assert!(matches!(
            wizard.complete_step(&mut session, "basics", note("basics", " "), t0()),
            Err(WizardError::Validation(_))
        ));
        assert!(matches!(
            wizard.complete_step(&mut session, "basics", note("confirm", "x"), t0()),
            Err(WizardError::PayloadMismatch { .. })
        ));
        assert!(matches!(
            wizard.complete_step(&mut session, "nope", note("nope", "x"), t0()),
            Err(WizardError::UnknownStep(_))
        ));
        assert!(session.data.is_empty());
    }

    #[test]
    fn idle_session_resets_before_the_operation() {
        let wizard = definition();
        let mut session = wizard.start(t0());
        wizard.complete_step(&mut session, "basics", note("basics", "hello"), t0()).unwrap();

        let later = t0() + Duration::minutes(31);
        let err = wizard.complete_step(&mut session, "confirm", note("confirm", "yes"), later).unwrap_err();
        assert!(matches!(err, WizardError::StepNotAccessible { .. }));
        assert_eq!(session.current_step, Some("basics"));
        assert_eq!(session.started_at, later);
        assert!(session.data.is_empty());
    }

    #[test]
    fn activity_within_timeout_keeps_progress() {
        let wizard = definition();
        let mut session = wizard.start(t0());
        wizard.complete_step(&mut session, "basics", note("basics", "hello"), t0()).unwrap();
        assert!(!wizard.expire_if_idle(&mut session, t0() + Duration::minutes(30)));
        assert!(session.is_completed("basics"));
    }

    #[test]
    fn reopen_clears_completion() {
        let wizard = definition();
        let mut session = wizard.start(t0());
        wizard.complete_step(&mut session, "basics", note("basics", "no extras"), t0()).unwrap();
        wizard.complete_step(&mut session, "confirm", note("confirm", "yes"), t0()).unwrap();

        wizard.reopen(&mut session, "confirm").unwrap();
        assert!(!session.is_complete);
        assert_eq!(session.current_step, Some("confirm"));
        assert!(session.payload("confirm").is_some());
    }
}

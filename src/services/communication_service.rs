use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::collections::BTreeSet;
use tracing::info;

use super::{ServiceError, ServiceResult};
use crate::auth::Role;
use crate::database::models::message::{InboxItem, Message};
use crate::repositories::message::{self as message_repo, NewMessage};
use crate::repositories::page_bounds;
use crate::repositories::{school as school_repo, student as student_repo, user as user_repo};
use crate::validation::{FieldErrors, Validate};

const PRIORITIES: &[&str] = &["LOW", "NORMAL", "HIGH", "URGENT"];
/// Largest USERS audience; the id list is stored as the message's filter text.
pub const MAX_DIRECT_RECIPIENTS: usize = 1000;

/// Who a message is addressed to. Recipients are resolved once, at send time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    All,
    Role(Role),
    /// Parents of active students in the class.
    Class(i64),
    Users(Vec<i64>),
}

impl Audience {
    pub fn kind(&self) -> &'static str {
        match self {
            Audience::All => "ALL",
            Audience::Role(_) => "ROLE",
            Audience::Class(_) => "CLASS",
            Audience::Users(_) => "USERS",
        }
    }

    /// Stored alongside the kind so the message records how it was addressed.
    pub fn filter_text(&self) -> Option<String> {
        match self {
            Audience::All => None,
            Audience::Role(role) => Some(role.as_str().to_string()),
            Audience::Class(class_id) => Some(class_id.to_string()),
            Audience::Users(ids) => Some(ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub subject: String,
    pub body: String,
    pub audience: String,
    pub role: Option<String>,
    pub class_id: Option<i64>,
    #[serde(default)]
    pub user_ids: Vec<i64>,
    pub priority: Option<String>,
}

impl SendMessageRequest {
    pub fn target(&self) -> Result<Audience, FieldErrors> {
        let mut errors = FieldErrors::new();
        let audience = match self.audience.as_str() {
            "ALL" => Some(Audience::All),
            "ROLE" => match self.role.as_deref().map(str::parse::<Role>) {
                Some(Ok(role)) if role.is_trust_role() => Some(Audience::Role(role)),
                _ => {
                    errors.add("role", "a trust role is required for ROLE messages");
                    None
                }
            },
            "CLASS" => match self.class_id {
                Some(class_id) => Some(Audience::Class(class_id)),
                None => {
                    errors.add("class_id", "is required for CLASS messages");
                    None
                }
            },
            "USERS" => {
                let ids: BTreeSet<i64> = self.user_ids.iter().copied().collect();
                if ids.is_empty() {
                    errors.add("user_ids", "must list at least one user for USERS messages");
                    None
                } else if ids.len() > MAX_DIRECT_RECIPIENTS {
                    errors.add(
                        "user_ids",
                        format!("must list at most {} users; use a ROLE or CLASS audience", MAX_DIRECT_RECIPIENTS),
                    );
                    None
                } else {
                    Some(Audience::Users(ids.into_iter().collect()))
                }
            }
            other => {
                errors.one_of("audience", other, &["ALL", "ROLE", "CLASS", "USERS"]);
                None
            }
        };
        errors.into_result()?;
        audience.ok_or_else(FieldErrors::new)
    }

    fn priority(&self) -> &str {
        self.priority.as_deref().unwrap_or("NORMAL")
    }
}

impl Validate for SendMessageRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if errors.required("subject", &self.subject) {
            errors.length("subject", &self.subject, 1, 200);
        }
        if errors.required("body", &self.body) {
            errors.length("body", &self.body, 1, 10_000);
        }
        errors.one_of("priority", self.priority(), PRIORITIES);
        if let Err(audience_errors) = self.target() {
            for (field, message) in audience_errors.into_inner() {
                errors.add(field, message);
            }
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SentMessage {
    pub message: Message,
    pub recipient_count: usize,
}

#[derive(Debug, Serialize)]
pub struct Inbox {
    pub items: Vec<InboxItem>,
    pub unread_count: i64,
}

pub struct CommunicationService<'a> {
    pool: &'a MySqlPool,
}

impl<'a> CommunicationService<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }

    async fn resolve_recipients(&self, audience: &Audience, sender_id: i64) -> ServiceResult<Vec<i64>> {
        let ids = match audience {
            Audience::All => user_repo::all_active_ids(self.pool).await?,
            Audience::Role(role) => user_repo::ids_by_role(self.pool, role.as_str()).await?,
            Audience::Class(class_id) => {
                if school_repo::find_class(self.pool, *class_id).await?.is_none() {
                    return Err(ServiceError::invalid_field("class_id", "class does not exist"));
                }
                student_repo::parent_ids_in_class(self.pool, *class_id).await?
            }
            Audience::Users(ids) => user_repo::existing_active_ids(self.pool, ids).await?,
        };
        Ok(ids.into_iter().filter(|id| *id != sender_id).collect())
    }

    pub async fn send(&self, request: SendMessageRequest, sender_id: i64) -> ServiceResult<SentMessage> {
        request.validate()?;
        let audience = request.target()?;

        let recipients = self.resolve_recipients(&audience, sender_id).await?;
        if recipients.is_empty() {
            return Err(ServiceError::business_rule("No recipients match the selected audience"));
        }

        let filter = audience.filter_text();
        let message = NewMessage {
            sender_id,
            subject: request.subject.trim(),
            body: &request.body,
            audience: audience.kind(),
            audience_filter: filter.as_deref(),
            priority: request.priority(),
        };

        let mut tx = self.pool.begin().await?;
        let message_id = message_repo::insert(&mut *tx, &message).await?;
        for user_id in &recipients {
            message_repo::insert_recipient(&mut *tx, message_id, *user_id).await?;
        }
        tx.commit().await?;

        info!(
            "Message {} sent by {} to {} recipients ({})",
            message_id,
            sender_id,
            recipients.len(),
            audience.kind()
        );

        let message = message_repo::find(self.pool, message_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Message"))?;
        Ok(SentMessage {
            message,
            recipient_count: recipients.len(),
        })
    }

    pub async fn sent(&self, sender_id: i64, page: Option<u32>, limit: Option<u32>) -> ServiceResult<Vec<Message>> {
        let (limit, offset) = page_bounds(page, limit);
        Ok(message_repo::list_sent(self.pool, sender_id, limit, offset).await?)
    }

    pub async fn inbox(&self, user_id: i64, query: InboxQuery) -> ServiceResult<Inbox> {
        let (limit, offset) = page_bounds(query.page, query.limit);
        let items = message_repo::inbox(self.pool, user_id, query.unread_only, limit, offset).await?;
        let unread_count = message_repo::unread_count(self.pool, user_id).await?;
        Ok(Inbox { items, unread_count })
    }

    pub async fn mark_read(&self, message_id: i64, user_id: i64) -> ServiceResult<()> {
        if !message_repo::mark_read(self.pool, message_id, user_id).await? {
            return Err(ServiceError::not_found("Message"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(audience: &str) -> SendMessageRequest {
        SendMessageRequest {
            subject: "PTM on Saturday".into(),
            body: "Parent-teacher meeting at 10am.".into(),
            audience: audience.into(),
            role: None,
            class_id: None,
            user_ids: vec![],
            priority: None,
        }
    }

    #[test]
    fn audience_requires_its_filter() {
        assert_eq!(request("ALL").target().unwrap(), Audience::All);
        assert!(request("ROLE").target().unwrap_err().contains("role"));
        assert!(request("CLASS").target().unwrap_err().contains("class_id"));
        assert!(request("USERS").target().unwrap_err().contains("user_ids"));
        assert!(request("EVERYONE").target().unwrap_err().contains("audience"));
    }

    #[test]
    fn role_audience_excludes_system_admin() {
        let mut r = request("ROLE");
        r.role = Some("SYSTEM_ADMIN".into());
        assert!(r.target().is_err());
        r.role = Some("TEACHER".into());
        assert_eq!(r.target().unwrap(), Audience::Role(Role::Teacher));
    }

    #[test]
    fn user_ids_are_deduplicated_and_recorded() {
        let mut r = request("USERS");
        r.user_ids = vec![9, 4, 9];
        let audience = r.target().unwrap();
        assert_eq!(audience, Audience::Users(vec![4, 9]));
        assert_eq!(audience.filter_text().as_deref(), Some("4,9"));
    }

    #[test]
    fn large_user_audience_fits_filter_column() {
        let mut r = request("USERS");
        r.user_ids = (100_000..100_060).collect();
        let filter = r.target().unwrap().filter_text().unwrap();
        assert!(filter.len() > 255);
        assert!(r.validate().is_ok());

        r.user_ids = (1..=MAX_DIRECT_RECIPIENTS as i64 + 1).collect();
        assert!(r.validate().unwrap_err().contains("user_ids"));

        // Widest accepted list stays well inside a TEXT column
        let widest = Audience::Users((i64::MAX - MAX_DIRECT_RECIPIENTS as i64..i64::MAX).collect());
        assert!(widest.filter_text().unwrap().len() < 65_535);
    }

    #[test]
    fn priority_defaults_to_normal_and_is_checked() {
        assert!(request("ALL").validate().is_ok());
        let mut r = request("ALL");
        r.priority = Some("CRITICAL".into());
        assert!(r.validate().unwrap_err().contains("priority"));
    }
}

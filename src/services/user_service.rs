use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;

use super::audit::{self, AuditTable};
use super::{Page, ServiceError, ServiceResult};
use crate::auth::{hash_password, Role};
use crate::database::is_unique_violation;
use crate::database::models::user::User;
use crate::repositories::page_bounds;
use crate::repositories::user::{self as user_repo, NewUser, UserChanges, UserFilter};
use crate::validation::{FieldErrors, Validate};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub school_id: Option<i64>,
}

fn check_trust_role(errors: &mut FieldErrors, raw: &str) {
    match raw.parse::<Role>() {
        Ok(role) if role.is_trust_role() => {}
        _ => errors.one_of("role", raw, &Role::TRUST_ROLES.iter().map(|r| r.as_str()).collect::<Vec<_>>()),
    }
}

impl Validate for CreateUserRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if errors.required("email", &self.email) {
            errors.email("email", &self.email);
        }
        if errors.required("password", &self.password) {
            errors.length("password", &self.password, 8, 128);
        }
        if errors.required("full_name", &self.full_name) {
            errors.length("full_name", &self.full_name, 2, 200);
        }
        check_trust_role(&mut errors, &self.role);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub school_id: Option<i64>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.full_name {
            errors.length("full_name", name, 2, 200);
        }
        if let Some(role) = &self.role {
            check_trust_role(&mut errors, role);
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub struct UserService<'a> {
    pool: &'a MySqlPool,
}

impl<'a> UserService<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn create_user(&self, request: CreateUserRequest, actor: i64) -> ServiceResult<User> {
        request.validate()?;
        let email = request.email.trim().to_ascii_lowercase();

        if user_repo::email_exists(self.pool, &email).await? {
            return Err(ServiceError::already_exists(format!("User with email '{}' already exists", email)));
        }

        let password_hash = hash_password(request.password).await?;
        let new_user = NewUser {
            school_id: request.school_id,
            email: &email,
            password_hash: &password_hash,
            full_name: request.full_name.trim(),
            phone: request.phone.as_deref(),
            role: &request.role,
        };
        let user_id = match user_repo::insert(self.pool, &new_user).await {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => {
                return Err(ServiceError::already_exists(format!("User with email '{}' already exists", email)));
            }
            Err(e) => return Err(e.into()),
        };

        audit::record(
            self.pool,
            AuditTable::Trust,
            Some(actor),
            "CREATE",
            "user",
            Some(user_id),
            Some(json!({ "role": request.role })),
        )
        .await;
        info!("Created {} user {}", request.role, user_id);

        self.get_user(user_id).await
    }

    pub async fn list_users(&self, query: UserQuery) -> ServiceResult<Page<User>> {
        let (limit, offset) = page_bounds(query.page, query.limit);
        let filter = UserFilter {
            role: query.role,
            is_active: query.is_active,
            limit,
            offset,
        };
        let (users, total) = user_repo::list(self.pool, &filter).await?;
        Ok(Page::new(users, total, limit, offset))
    }

    pub async fn get_user(&self, user_id: i64) -> ServiceResult<User> {
        user_repo::find_by_id(self.pool, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))
    }

    pub async fn update_user(&self, user_id: i64, request: UpdateUserRequest, actor: i64) -> ServiceResult<User> {
        request.validate()?;
        self.get_user(user_id).await?;

        let changes = UserChanges {
            full_name: request.full_name.map(|s| s.trim().to_string()),
            phone: request.phone,
            role: request.role,
            school_id: request.school_id,
        };
        user_repo::update(self.pool, user_id, &changes).await?;
        audit::record(self.pool, AuditTable::Trust, Some(actor), "UPDATE", "user", Some(user_id), None).await;

        self.get_user(user_id).await
    }

    /// Soft delete. Users cannot deactivate themselves.
    pub async fn deactivate_user(&self, user_id: i64, actor: i64) -> ServiceResult<User> {
        if user_id == actor {
            return Err(ServiceError::business_rule("You cannot deactivate your own account"));
        }
        let user = self.get_user(user_id).await?;
        if !user.is_active {
            return Err(ServiceError::InvalidState("User is already inactive".into()));
        }

        user_repo::set_active(self.pool, user_id, false).await?;
        audit::record(self.pool, AuditTable::Trust, Some(actor), "DEACTIVATE", "user", Some(user_id), None).await;
        info!("Deactivated user {}", user_id);

        self.get_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: "teacher@gvt.edu".into(),
            password: "teach-1234".into(),
            full_name: "Asha Rao".into(),
            phone: None,
            role: role.into(),
            school_id: Some(1),
        }
    }

    #[test]
    fn only_trust_roles_can_be_created() {
        assert!(request("TEACHER").validate().is_ok());
        assert!(request("SYSTEM_ADMIN").validate().unwrap_err().contains("role"));
        assert!(request("PRINCIPAL").validate().unwrap_err().contains("role"));
    }
}

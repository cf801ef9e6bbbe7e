use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, warn};

use super::{ServiceError, ServiceResult};
use crate::auth::{generate_jwt, hash_password, verify_password, Claims, Role, TokenScope};
use crate::config;
use crate::repositories::{system_user, user as user_repo};
use crate::validation::{FieldErrors, Validate};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

#[derive(Debug, Clone, Deserialize)]
pub struct SystemLoginRequest {
    pub username: String,
    pub password: String,
}

impl Validate for SystemLoginRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.required("username", &self.username);
        errors.required("password", &self.password);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if errors.required("email", &self.email) {
            errors.email("email", &self.email);
        }
        errors.required("password", &self.password);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.required("current_password", &self.current_password);
        if errors.required("new_password", &self.new_password) {
            errors.length("new_password", &self.new_password, 8, 128);
        }
        if self.current_password == self.new_password {
            errors.add("new_password", "must differ from the current password");
        }
        errors.into_result()
    }
}

/// Identity of the caller as returned by login and `/auth/me`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub scope: TokenScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: Profile,
}

impl LoginResponse {
    fn issue(claims: &Claims, user: Profile) -> ServiceResult<Self> {
        Ok(Self {
            token: generate_jwt(claims)?,
            token_type: "Bearer",
            expires_in: config::config().security.jwt_expiry_hours * 3600,
            user,
        })
    }
}

fn parse_role(raw: &str) -> ServiceResult<Role> {
    raw.parse()
        .map_err(|e: String| ServiceError::Internal(format!("stored role is invalid: {}", e)))
}

/// Credential checks for system operators (master DB) and trust users
/// (trust DB). The pool decides which population is consulted.
pub struct AuthService<'a> {
    pool: &'a MySqlPool,
}

impl<'a> AuthService<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn system_login(&self, request: SystemLoginRequest) -> ServiceResult<LoginResponse> {
        request.validate()?;
        let Some(user) = system_user::find_by_username(self.pool, request.username.trim()).await? else {
            warn!("System login failed for unknown user '{}'", request.username);
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.into()));
        };
        if !verify_password(request.password, user.password_hash.clone()).await? {
            warn!("System login failed for '{}'", user.username);
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
        if !user.is_active {
            return Err(ServiceError::Forbidden("Account is inactive".into()));
        }

        system_user::touch_login(self.pool, user.id).await?;
        let role = parse_role(&user.role)?;
        let claims = Claims::system(user.id, user.username.clone(), role);
        info!("System user {} logged in", user.username);

        LoginResponse::issue(
            &claims,
            Profile {
                id: user.id,
                name: user.full_name,
                email: user.email,
                role,
                scope: TokenScope::System,
                trust_id: None,
                school_id: None,
            },
        )
    }

    pub async fn login(&self, trust_id: i64, request: LoginRequest) -> ServiceResult<LoginResponse> {
        request.validate()?;
        let email = request.email.trim().to_ascii_lowercase();
        let Some(user) = user_repo::find_by_email(self.pool, &email).await? else {
            warn!("Login failed for unknown email in trust {}", trust_id);
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.into()));
        };
        if !verify_password(request.password, user.password_hash.clone()).await? {
            warn!("Login failed for user {} in trust {}", user.id, trust_id);
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
        if !user.is_active {
            return Err(ServiceError::Forbidden("Account is inactive".into()));
        }

        user_repo::touch_login(self.pool, user.id).await?;
        let role = parse_role(&user.role)?;
        let claims = Claims::trust(user.id, user.email.clone(), role, trust_id);
        info!("User {} logged in to trust {}", user.id, trust_id);

        LoginResponse::issue(
            &claims,
            Profile {
                id: user.id,
                name: user.full_name,
                email: user.email,
                role,
                scope: TokenScope::Trust,
                trust_id: Some(trust_id),
                school_id: user.school_id,
            },
        )
    }

    pub async fn profile(&self, claims: &Claims) -> ServiceResult<Profile> {
        match claims.scope {
            TokenScope::System => {
                let user = system_user::find_by_id(self.pool, claims.sub)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("User"))?;
                Ok(Profile {
                    id: user.id,
                    name: user.full_name,
                    email: user.email,
                    role: parse_role(&user.role)?,
                    scope: TokenScope::System,
                    trust_id: None,
                    school_id: None,
                })
            }
            TokenScope::Trust => {
                let user = user_repo::find_by_id(self.pool, claims.sub)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("User"))?;
                Ok(Profile {
                    id: user.id,
                    name: user.full_name,
                    email: user.email,
                    role: parse_role(&user.role)?,
                    scope: TokenScope::Trust,
                    trust_id: claims.trust_id,
                    school_id: user.school_id,
                })
            }
        }
    }

    pub async fn change_password(&self, claims: &Claims, request: ChangePasswordRequest) -> ServiceResult<()> {
        request.validate()?;
        let current_hash = match claims.scope {
            TokenScope::System => system_user::find_by_id(self.pool, claims.sub).await?.map(|u| u.password_hash),
            TokenScope::Trust => user_repo::find_by_id(self.pool, claims.sub).await?.map(|u| u.password_hash),
        }
        .ok_or_else(|| ServiceError::not_found("User"))?;

        if !verify_password(request.current_password, current_hash).await? {
            return Err(ServiceError::invalid_field("current_password", "is incorrect"));
        }

        let new_hash = hash_password(request.new_password).await?;
        match claims.scope {
            TokenScope::System => system_user::update_password(self.pool, claims.sub, &new_hash).await?,
            TokenScope::Trust => user_repo::update_password(self.pool, claims.sub, &new_hash).await?,
        }
        info!("Password changed for {:?} user {}", claims.scope, claims.sub);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_requires_email_shape() {
        let request = LoginRequest {
            email: "teacher".into(),
            password: "x".into(),
        };
        assert!(request.validate().unwrap_err().contains("email"));
    }

    #[test]
    fn new_password_rules() {
        let short = ChangePasswordRequest {
            current_password: "old-password".into(),
            new_password: "short".into(),
        };
        assert!(short.validate().unwrap_err().contains("new_password"));

        let same = ChangePasswordRequest {
            current_password: "same-password".into(),
            new_password: "same-password".into(),
        };
        assert!(same.validate().unwrap_err().contains("new_password"));
    }
}

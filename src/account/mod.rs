//! Account self-service: signup and password change.

pub mod payroll;
pub mod validate;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::audit::AuditLogger;
use crate::error::DomainError;
use crate::security::CredentialHasher;
use crate::store::{NewUser, RoleStore, StoreError, UserRecord, UserStore};

use validate::{is_valid_email, join_violations, validate_password, NOT_EMPTY_ERRORMSG};

use crate::admin::{ADMINISTRATOR_ROLE, USER_ROLE};

pub const USER_EXISTS_ERRORMSG: &str = "User exist!";
pub const SAME_PASSWORD_ERRORMSG: &str = "The passwords must be different!";
pub const PASSWORD_UPDATEMSG: &str = "The password has been updated successfully";

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: String,
    pub lastname: String,
    pub email: String,
    #[schema(value_type = String)]
    pub password: SecretString,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangepassRequest {
    #[serde(rename = "new_password")]
    #[schema(value_type = String)]
    pub new_password: SecretString,
}

/// User as presented on signup and admin responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl UserView {
    #[must_use]
    pub fn from_record(user: UserRecord, mut roles: Vec<String>) -> Self {
        roles.sort();
        Self {
            id: user.id,
            name: user.name,
            lastname: user.lastname,
            email: user.email,
            roles,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PasswordChanged {
    pub email: String,
    pub status: String,
}

pub struct AccountService {
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    hasher: Arc<CredentialHasher>,
    audit: AuditLogger,
}

impl AccountService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        hasher: Arc<CredentialHasher>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            users,
            roles,
            hasher,
            audit,
        }
    }

    /// Registers a new user. The very first signup gets the administrator
    /// role, everyone after that the plain user role.
    ///
    /// # Errors
    /// `Validation` for malformed fields, `Conflict` when the email is taken.
    pub async fn signup(&self, request: SignupRequest) -> Result<UserView, DomainError> {
        validate_signup(&request)?;

        let role = if self.users.count().await? == 0 {
            ADMINISTRATOR_ROLE
        } else {
            USER_ROLE
        };

        let password_hash = self
            .hasher
            .hash(request.password.expose_secret())
            .map_err(DomainError::internal)?;
        let inserted = self
            .users
            .insert(NewUser {
                name: request.name,
                lastname: request.lastname,
                email: request.email,
                password_hash,
            })
            .await
            .map_err(|err| match err {
                StoreError::Duplicate => DomainError::Conflict(USER_EXISTS_ERRORMSG.to_string()),
                other => DomainError::Store(other),
            })?;

        self.roles.grant(&inserted.email, role).await?;
        self.audit.create_user(&inserted.email).await?;
        Ok(UserView::from_record(inserted, vec![role.to_string()]))
    }

    /// Replaces the password of the authenticated user.
    ///
    /// # Errors
    /// `Validation` for weak or breached passwords, `Conflict` when the new
    /// password equals the current one.
    pub async fn change_password(
        &self,
        email: &str,
        request: ChangepassRequest,
    ) -> Result<PasswordChanged, DomainError> {
        let new_password = request.new_password.expose_secret();
        if let Some(violation) = validate_password(new_password) {
            return Err(DomainError::Validation(violation.to_string()));
        }

        let user = self
            .users
            .find(email)
            .await?
            .ok_or_else(|| DomainError::NotFound("User not found!".to_string()))?;
        if self.hasher.verify(new_password, &user.password_hash) {
            return Err(DomainError::Conflict(SAME_PASSWORD_ERRORMSG.to_string()));
        }

        let password_hash = self
            .hasher
            .hash(new_password)
            .map_err(DomainError::internal)?;
        self.users
            .update_password(&user.email, &password_hash)
            .await?;
        self.audit.change_password(&user.email).await?;
        Ok(PasswordChanged {
            email: user.email,
            status: PASSWORD_UPDATEMSG.to_string(),
        })
    }
}

fn validate_signup(request: &SignupRequest) -> Result<(), DomainError> {
    let mut violations = Vec::new();
    if request.name.trim().is_empty() {
        violations.push(format!("name {NOT_EMPTY_ERRORMSG}"));
    }
    if request.lastname.trim().is_empty() {
        violations.push(format!("lastname {NOT_EMPTY_ERRORMSG}"));
    }
    if !is_valid_email(&request.email) {
        violations.push(validate::INVALID_EMAIL_ERRORMSG.to_string());
    }
    let password = request.password.expose_secret();
    if password.is_empty() {
        violations.push(format!("password {NOT_EMPTY_ERRORMSG}"));
    } else if let Some(violation) = validate_password(password) {
        violations.push(violation.to_string());
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(join_violations(&violations)))
    }
}

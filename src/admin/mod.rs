//! Admin surface: the role mutation engine, lock toggling, account deletion,
//! and the user listing.
//!
//! Role mutation checks run in a fixed order (role exists, user exists,
//! remove rules, grant rules) so the same bad request always fails the same
//! way. The administrator is protected: never lockable, never deletable,
//! never combined with business roles.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::account::validate::{is_valid_email, join_violations, INVALID_EMAIL_ERRORMSG};
use crate::account::UserView;
use crate::audit::AuditLogger;
use crate::error::DomainError;
use crate::store::{RoleStore, UserStore};

pub const ROLE_PREFIX: &str = "ROLE_";
pub const ADMINISTRATOR_ROLE: &str = "ROLE_ADMINISTRATOR";
pub const USER_ROLE: &str = "ROLE_USER";
pub const ACCOUNTANT_ROLE: &str = "ROLE_ACCOUNTANT";
pub const AUDITOR_ROLE: &str = "ROLE_AUDITOR";

pub const DELETED_SUCCESSFULLY: &str = "Deleted successfully!";
pub const USER_NOT_FOUND_ERRORMSG: &str = "User not found!";
pub const ROLE_NOT_FOUND_ERRORMSG: &str = "Role not found!";
pub const CANT_DELETE_ADMIN_ERRORMSG: &str = "Can't remove ADMINISTRATOR role!";
pub const CANT_LOCK_ADMIN_ERRORMSG: &str = "Can't lock the ADMINISTRATOR!";
pub const USER_HASNT_ROLE_ERRORMSG: &str = "The user does not have a role!";
pub const USER_NEEDS_ROLE_ERRORMSG: &str = "The user must have at least one role!";
pub const USER_HAS_ROLE_ALREADY_ERRORMSG: &str = "The user already has a role!";
pub const INVALID_ROLE_COMBINE_ERRORMSG: &str =
    "The user cannot combine administrative and business roles!";
pub const ROLE_OPERATION_ERRORMSG: &str = "operation needs 'grant' or 'remove'";
pub const LOCK_OPERATION_ERRORMSG: &str = "operation must be 'lock' or 'unlock'";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleOp {
    Grant,
    Remove,
}

impl RoleOp {
    fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("grant") {
            Some(Self::Grant)
        } else if value.eq_ignore_ascii_case("remove") {
            Some(Self::Remove)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOp {
    Lock,
    Unlock,
}

impl LockOp {
    fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("lock") {
            Some(Self::Lock)
        } else if value.eq_ignore_ascii_case("unlock") {
            Some(Self::Unlock)
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleToggleRequest {
    pub user: String,
    pub role: String,
    pub operation: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LockToggleRequest {
    pub user: String,
    pub operation: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDeleted {
    pub user: String,
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LockStatus {
    pub status: String,
}

pub struct AdminService {
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    audit: AuditLogger,
}

impl AdminService {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, roles: Arc<dyn RoleStore>, audit: AuditLogger) -> Self {
        Self {
            users,
            roles,
            audit,
        }
    }

    /// All users ascending by id with their role sets.
    ///
    /// # Errors
    /// `Store` when the backing store fails.
    pub async fn list_users(&self) -> Result<Vec<UserView>, DomainError> {
        let users = self.users.list().await?;
        let mut views = Vec::with_capacity(users.len());
        for user in users {
            let roles = self.roles.roles_of(&user.email).await?;
            views.push(UserView::from_record(user, roles));
        }
        Ok(views)
    }

    /// Grants or removes one role and returns the refreshed user.
    ///
    /// Checks run in a fixed order: the role must exist in the system, the
    /// user must exist, then the remove rules, then the grant rules. Nothing
    /// is mutated or audited when any check fails.
    ///
    /// # Errors
    /// `Validation`, `NotFound`, `Conflict` or `Forbidden` per the violated
    /// rule.
    pub async fn toggle_role(
        &self,
        acting_admin: &str,
        request: RoleToggleRequest,
    ) -> Result<UserView, DomainError> {
        let mut violations = Vec::new();
        if !is_valid_email(&request.user) {
            violations.push(INVALID_EMAIL_ERRORMSG.to_string());
        }
        let op = RoleOp::parse(&request.operation);
        if op.is_none() {
            violations.push(ROLE_OPERATION_ERRORMSG.to_string());
        }
        if !violations.is_empty() {
            return Err(DomainError::Validation(
                join_violations(&violations),
            ));
        }
        let Some(op) = op else {
            return Err(DomainError::Validation(ROLE_OPERATION_ERRORMSG.to_string()));
        };

        let requested_suffix = request.role.to_uppercase();
        let system_roles = self.roles.system_roles().await?;
        if !system_roles
            .iter()
            .any(|role| role.ends_with(&requested_suffix))
        {
            return Err(DomainError::NotFound(ROLE_NOT_FOUND_ERRORMSG.to_string()));
        }

        let held = self.roles.roles_of(&request.user).await?;
        if held.is_empty() {
            return Err(DomainError::NotFound(USER_NOT_FOUND_ERRORMSG.to_string()));
        }

        let requested_role = format!("{ROLE_PREFIX}{requested_suffix}");
        let has_requested = held.iter().any(|role| *role == requested_role);
        match op {
            RoleOp::Remove => {
                if !has_requested {
                    return Err(DomainError::Conflict(USER_HASNT_ROLE_ERRORMSG.to_string()));
                }
                if held.len() == 1 {
                    return Err(if requested_role == ADMINISTRATOR_ROLE {
                        DomainError::Forbidden(CANT_DELETE_ADMIN_ERRORMSG.to_string())
                    } else {
                        DomainError::Conflict(USER_NEEDS_ROLE_ERRORMSG.to_string())
                    });
                }
                self.roles.revoke(&request.user, &requested_role).await?;
            }
            RoleOp::Grant => {
                if has_requested {
                    return Err(DomainError::Conflict(
                        USER_HAS_ROLE_ALREADY_ERRORMSG.to_string(),
                    ));
                }
                if requested_role == ADMINISTRATOR_ROLE
                    || held.iter().any(|role| role == ADMINISTRATOR_ROLE)
                {
                    return Err(DomainError::Conflict(
                        INVALID_ROLE_COMBINE_ERRORMSG.to_string(),
                    ));
                }
                self.roles.grant(&request.user, &requested_role).await?;
            }
        }

        self.audit
            .toggle_role(
                acting_admin,
                op == RoleOp::Grant,
                &request.role,
                &request.user,
            )
            .await?;
        self.refreshed_view(&request.user).await
    }

    /// Locks or unlocks a user. Unlocking an already-unlocked user succeeds
    /// and still resets the failure counter.
    ///
    /// # Errors
    /// `Forbidden` for the administrator, `NotFound` for unknown users.
    pub async fn toggle_lock(
        &self,
        acting_admin: &str,
        request: LockToggleRequest,
    ) -> Result<LockStatus, DomainError> {
        let mut violations = Vec::new();
        if !is_valid_email(&request.user) {
            violations.push(INVALID_EMAIL_ERRORMSG.to_string());
        }
        let op = LockOp::parse(&request.operation);
        if op.is_none() {
            violations.push(LOCK_OPERATION_ERRORMSG.to_string());
        }
        if !violations.is_empty() {
            return Err(DomainError::Validation(
                join_violations(&violations),
            ));
        }
        let Some(op) = op else {
            return Err(DomainError::Validation(LOCK_OPERATION_ERRORMSG.to_string()));
        };

        let held = self.roles.roles_of(&request.user).await?;
        if held.is_empty() {
            return Err(DomainError::NotFound(USER_NOT_FOUND_ERRORMSG.to_string()));
        }
        if held.iter().any(|role| role == ADMINISTRATOR_ROLE) {
            return Err(DomainError::Forbidden(CANT_LOCK_ADMIN_ERRORMSG.to_string()));
        }

        let lock = op == LockOp::Lock;
        self.users.set_locked(&request.user, lock).await?;
        self.audit
            .toggle_lock(acting_admin, lock, &request.user)
            .await?;
        let verb = if lock { "locked" } else { "unlocked" };
        Ok(LockStatus {
            status: format!("User {} {verb}!", request.user),
        })
    }

    /// Deletes a user with all role assignments and payroll rows.
    ///
    /// # Errors
    /// `Validation` for a malformed email, `NotFound` for unknown users,
    /// `Forbidden` for the administrator.
    pub async fn delete_user(
        &self,
        acting_admin: &str,
        email: &str,
    ) -> Result<UserDeleted, DomainError> {
        if !is_valid_email(email) {
            return Err(DomainError::Validation(format!(
                "Invalid user email given: '{email}'!"
            )));
        }
        let held = self.roles.roles_of(email).await?;
        if held.is_empty() {
            return Err(DomainError::NotFound(USER_NOT_FOUND_ERRORMSG.to_string()));
        }
        if held.iter().any(|role| role == ADMINISTRATOR_ROLE) {
            return Err(DomainError::Forbidden(
                CANT_DELETE_ADMIN_ERRORMSG.to_string(),
            ));
        }

        self.users.delete_account(email).await?;
        self.audit.delete_user(acting_admin, email).await?;
        Ok(UserDeleted {
            user: email.to_string(),
            status: DELETED_SUCCESSFULLY.to_string(),
        })
    }

    async fn refreshed_view(&self, email: &str) -> Result<UserView, DomainError> {
        let user = self
            .users
            .find(email)
            .await?
            .ok_or_else(|| DomainError::NotFound(USER_NOT_FOUND_ERRORMSG.to_string()))?;
        let roles = self.roles.roles_of(&user.email).await?;
        Ok(UserView::from_record(user, roles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditAction;
    use crate::store::{NewUser, Stores};

    const ADMIN: &str = "admin@acme.com";

    fn service(stores: &Stores) -> AdminService {
        AdminService::new(
            stores.users.clone(),
            stores.roles.clone(),
            AuditLogger::new(stores.audit.clone()),
        )
    }

    async fn seed_user(stores: &Stores, email: &str, roles: &[&str]) {
        stores
            .users
            .insert(NewUser {
                name: "Max".to_string(),
                lastname: "Mustermann".to_string(),
                email: email.to_string(),
                password_hash: "$argon2id$stub".to_string(),
            })
            .await
            .unwrap();
        for role in roles {
            stores.roles.grant(email, role).await.unwrap();
        }
    }

    fn role_request(user: &str, role: &str, operation: &str) -> RoleToggleRequest {
        RoleToggleRequest {
            user: user.to_string(),
            role: role.to_string(),
            operation: operation.to_string(),
        }
    }

    #[tokio::test]
    async fn grant_and_remove_round_trip() {
        let stores = Stores::memory();
        seed_user(&stores, "max@acme.com", &[USER_ROLE]).await;
        let service = service(&stores);

        let view = service
            .toggle_role(ADMIN, role_request("max@acme.com", "accountant", "GRANT"))
            .await
            .unwrap();
        assert_eq!(
            view.roles,
            vec![ACCOUNTANT_ROLE.to_string(), USER_ROLE.to_string()]
        );

        let view = service
            .toggle_role(ADMIN, role_request("max@acme.com", "accountant", "remove"))
            .await
            .unwrap();
        assert_eq!(view.roles, vec![USER_ROLE.to_string()]);

        let events = stores.audit.events().await.unwrap();
        assert_eq!(events[0].action, AuditAction::GrantRole);
        assert_eq!(events[0].object, "Grant role ACCOUNTANT to max@acme.com");
        assert_eq!(events[1].action, AuditAction::RemoveRole);
        assert_eq!(events[1].object, "Remove role ACCOUNTANT from max@acme.com");
    }

    #[tokio::test]
    async fn unknown_role_fails_before_user_check() {
        let stores = Stores::memory();
        let service = service(&stores);

        // The user is unknown too; the role check must fire first.
        let err = service
            .toggle_role(ADMIN, role_request("ghost@acme.com", "wizard", "grant"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), ROLE_NOT_FOUND_ERRORMSG);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let stores = Stores::memory();
        let service = service(&stores);

        let err = service
            .toggle_role(ADMIN, role_request("ghost@acme.com", "accountant", "grant"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), USER_NOT_FOUND_ERRORMSG);
    }

    #[tokio::test]
    async fn cannot_remove_role_not_held() {
        let stores = Stores::memory();
        seed_user(&stores, "max@acme.com", &[USER_ROLE]).await;
        let service = service(&stores);

        let err = service
            .toggle_role(ADMIN, role_request("max@acme.com", "accountant", "remove"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), USER_HASNT_ROLE_ERRORMSG);
    }

    #[tokio::test]
    async fn sole_administrator_role_cannot_be_removed() {
        let stores = Stores::memory();
        seed_user(&stores, ADMIN, &[ADMINISTRATOR_ROLE]).await;
        let service = service(&stores);

        let err = service
            .toggle_role(ADMIN, role_request(ADMIN, "administrator", "remove"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert_eq!(err.to_string(), CANT_DELETE_ADMIN_ERRORMSG);

        // Nothing mutated, nothing audited.
        assert_eq!(
            stores.roles.roles_of(ADMIN).await.unwrap(),
            vec![ADMINISTRATOR_ROLE.to_string()]
        );
        assert!(stores.audit.events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_business_role_cannot_be_removed() {
        let stores = Stores::memory();
        seed_user(&stores, "max@acme.com", &[USER_ROLE]).await;
        let service = service(&stores);

        let err = service
            .toggle_role(ADMIN, role_request("max@acme.com", "user", "remove"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), USER_NEEDS_ROLE_ERRORMSG);
    }

    #[tokio::test]
    async fn administrator_cannot_combine_with_business_roles() {
        let stores = Stores::memory();
        seed_user(&stores, "max@acme.com", &[USER_ROLE]).await;
        let service = service(&stores);

        service
            .toggle_role(ADMIN, role_request("max@acme.com", "accountant", "grant"))
            .await
            .unwrap();
        let err = service
            .toggle_role(ADMIN, role_request("max@acme.com", "administrator", "grant"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), INVALID_ROLE_COMBINE_ERRORMSG);
    }

    #[tokio::test]
    async fn granting_held_role_conflicts() {
        let stores = Stores::memory();
        seed_user(&stores, "max@acme.com", &[USER_ROLE]).await;
        let service = service(&stores);

        let err = service
            .toggle_role(ADMIN, role_request("max@acme.com", "user", "grant"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), USER_HAS_ROLE_ALREADY_ERRORMSG);
    }

    #[tokio::test]
    async fn bad_operation_keyword_is_validation() {
        let stores = Stores::memory();
        let service = service(&stores);

        let err = service
            .toggle_role(ADMIN, role_request("max@acme.com", "user", "drop"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), ROLE_OPERATION_ERRORMSG);
    }

    #[tokio::test]
    async fn lock_and_unlock_reset_counter() {
        let stores = Stores::memory();
        seed_user(&stores, "max@acme.com", &[USER_ROLE]).await;
        stores.users.increment_failed("max@acme.com").await.unwrap();
        let service = service(&stores);

        let status = service
            .toggle_lock(
                ADMIN,
                LockToggleRequest {
                    user: "max@acme.com".to_string(),
                    operation: "lock".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(status.status, "User max@acme.com locked!");

        let user = stores.users.find("max@acme.com").await.unwrap().unwrap();
        assert!(user.locked);
        assert_eq!(user.failed_logins, 0);

        // Unlock twice; the second one is a no-op that still succeeds.
        for _ in 0..2 {
            let status = service
                .toggle_lock(
                    ADMIN,
                    LockToggleRequest {
                        user: "max@acme.com".to_string(),
                        operation: "unlock".to_string(),
                    },
                )
                .await
                .unwrap();
            assert_eq!(status.status, "User max@acme.com unlocked!");
        }
        let user = stores.users.find("max@acme.com").await.unwrap().unwrap();
        assert!(!user.locked);
        assert_eq!(user.failed_logins, 0);

        // Admin toggles carry the admin as subject, unlike brute-force locks.
        let events = stores.audit.events().await.unwrap();
        assert!(events
            .iter()
            .all(|event| event.subject == ADMIN && event.object.contains("max@acme.com")));
    }

    #[tokio::test]
    async fn administrator_cannot_be_locked() {
        let stores = Stores::memory();
        seed_user(&stores, ADMIN, &[ADMINISTRATOR_ROLE]).await;
        let service = service(&stores);

        let err = service
            .toggle_lock(
                ADMIN,
                LockToggleRequest {
                    user: ADMIN.to_string(),
                    operation: "lock".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert_eq!(err.to_string(), CANT_LOCK_ADMIN_ERRORMSG);
    }

    #[tokio::test]
    async fn delete_user_cascades_and_audits() {
        let stores = Stores::memory();
        seed_user(&stores, "max@acme.com", &[USER_ROLE]).await;
        let service = service(&stores);

        let deleted = service.delete_user(ADMIN, "max@acme.com").await.unwrap();
        assert_eq!(deleted.status, DELETED_SUCCESSFULLY);
        assert!(stores.users.find("max@acme.com").await.unwrap().is_none());

        let events = stores.audit.events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AuditAction::DeleteUser);
        assert_eq!(events[0].subject, ADMIN);
        assert_eq!(events[0].object, "max@acme.com");
    }

    #[tokio::test]
    async fn administrator_cannot_be_deleted() {
        let stores = Stores::memory();
        seed_user(&stores, ADMIN, &[ADMINISTRATOR_ROLE]).await;
        let service = service(&stores);

        let err = service.delete_user(ADMIN, ADMIN).await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));

        // No cascade ran.
        assert!(stores.users.find(ADMIN).await.unwrap().is_some());
        assert!(stores.audit.events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_users_ascends_by_id() {
        let stores = Stores::memory();
        seed_user(&stores, "a@acme.com", &[ADMINISTRATOR_ROLE]).await;
        seed_user(&stores, "b@acme.com", &[USER_ROLE]).await;
        let service = service(&stores);

        let views = service.list_users().await.unwrap();
        assert_eq!(views.len(), 2);
        assert!(views[0].id < views[1].id);
        assert_eq!(views[0].email, "a@acme.com");
    }
}

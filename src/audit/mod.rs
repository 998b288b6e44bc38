//! Append-only audit trail of security-relevant actions.
//!
//! Every component that accepts or rejects a security-relevant request logs
//! exactly one outcome here (brute-force lockouts log the documented event
//! triple). Ordering on read-back is the store-assigned monotonic id.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::{AuditStore, StoreResult};

pub const SIGNUP_PATH: &str = "/api/auth/signup";
pub const CHANGEPASS_PATH: &str = "/api/auth/changepass";
pub const ADMIN_USER_PATH: &str = "/api/admin/user";
pub const ROLE_TOGGLE_PATH: &str = "/api/admin/user/role";
pub const LOCK_TOGGLE_PATH: &str = "/api/admin/user/access";
pub const PAYMENT_PATH: &str = "/api/empl/payment";
pub const PAYMENTS_PATH: &str = "/api/acct/payments";
pub const EVENTS_PATH: &str = "/api/security/events";

/// Subject recorded for unauthenticated actions.
pub const ANONYMOUS: &str = "Anonymous";

/// Fixed action vocabulary of the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateUser,
    GrantRole,
    RemoveRole,
    LockUser,
    UnlockUser,
    DeleteUser,
    ChangePassword,
    AccessDenied,
    LoginFailed,
    BruteForce,
}

impl AuditAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateUser => "CREATE_USER",
            Self::GrantRole => "GRANT_ROLE",
            Self::RemoveRole => "REMOVE_ROLE",
            Self::LockUser => "LOCK_USER",
            Self::UnlockUser => "UNLOCK_USER",
            Self::DeleteUser => "DELETE_USER",
            Self::ChangePassword => "CHANGE_PASSWORD",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::BruteForce => "BRUTE_FORCE",
        }
    }

    /// Inverse of [`as_str`](Self::as_str), used when decoding store rows.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATE_USER" => Some(Self::CreateUser),
            "GRANT_ROLE" => Some(Self::GrantRole),
            "REMOVE_ROLE" => Some(Self::RemoveRole),
            "LOCK_USER" => Some(Self::LockUser),
            "UNLOCK_USER" => Some(Self::UnlockUser),
            "DELETE_USER" => Some(Self::DeleteUser),
            "CHANGE_PASSWORD" => Some(Self::ChangePassword),
            "ACCESS_DENIED" => Some(Self::AccessDenied),
            "LOGIN_FAILED" => Some(Self::LoginFailed),
            "BRUTE_FORCE" => Some(Self::BruteForce),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record; `id` is the durable ordering guarantee.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditEvent {
    pub id: i64,
    #[serde(rename = "date")]
    pub at: DateTime<Utc>,
    pub action: AuditAction,
    pub subject: String,
    pub object: String,
    pub path: String,
}

/// Event fields as handed to the store; id and timestamp are assigned there.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub action: AuditAction,
    pub subject: String,
    pub object: String,
    pub path: String,
}

/// Writer facade over the audit store with one method per action.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    async fn append(
        &self,
        action: AuditAction,
        subject: &str,
        object: &str,
        path: &str,
    ) -> StoreResult<()> {
        self.store
            .append(NewAuditEvent {
                action,
                subject: subject.to_string(),
                object: object.to_string(),
                path: path.to_string(),
            })
            .await?;
        Ok(())
    }

    /// Signup activity; the actor is by definition anonymous.
    pub async fn create_user(&self, new_user: &str) -> StoreResult<()> {
        self.append(AuditAction::CreateUser, ANONYMOUS, new_user, SIGNUP_PATH)
            .await
    }

    /// Admin grant or revoke of a role, with a human-readable object.
    pub async fn toggle_role(
        &self,
        admin: &str,
        grant: bool,
        role: &str,
        user: &str,
    ) -> StoreResult<()> {
        let role = role.to_uppercase();
        let (action, object) = if grant {
            (AuditAction::GrantRole, format!("Grant role {role} to {user}"))
        } else {
            (
                AuditAction::RemoveRole,
                format!("Remove role {role} from {user}"),
            )
        };
        self.append(action, admin, &object, ROLE_TOGGLE_PATH).await
    }

    /// Admin lock or unlock; the subject is the acting admin, which is what
    /// distinguishes these entries from brute-force locks.
    pub async fn toggle_lock(&self, admin: &str, lock: bool, user: &str) -> StoreResult<()> {
        let (action, object) = if lock {
            (AuditAction::LockUser, format!("Lock user {user}"))
        } else {
            (AuditAction::UnlockUser, format!("Unlock user {user}"))
        };
        self.append(action, admin, &object, LOCK_TOGGLE_PATH).await
    }

    pub async fn delete_user(&self, admin: &str, user: &str) -> StoreResult<()> {
        self.append(AuditAction::DeleteUser, admin, user, ADMIN_USER_PATH)
            .await
    }

    pub async fn change_password(&self, email: &str) -> StoreResult<()> {
        self.append(AuditAction::ChangePassword, email, email, CHANGEPASS_PATH)
            .await
    }

    /// Authenticated user hitting an endpoint its roles do not allow.
    pub async fn access_denied(&self, user: &str, path: &str) -> StoreResult<()> {
        self.append(AuditAction::AccessDenied, user, path, path)
            .await
    }

    pub async fn login_failed(&self, user: &str, path: &str) -> StoreResult<()> {
        self.append(AuditAction::LoginFailed, user, path, path)
            .await
    }

    /// Lockout triple tail: BRUTE_FORCE followed by LOCK_USER, both with
    /// subject = object = the locked identity.
    pub async fn brute_force(&self, user: &str, path: &str) -> StoreResult<()> {
        self.append(AuditAction::BruteForce, user, path, path)
            .await?;
        self.append(AuditAction::LockUser, user, user, path).await
    }

    /// Read-back, ascending by sequence id.
    pub async fn events(&self) -> StoreResult<Vec<AuditEvent>> {
        self.store.events().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Stores;

    #[test]
    fn action_names_round_trip() {
        let actions = [
            AuditAction::CreateUser,
            AuditAction::GrantRole,
            AuditAction::RemoveRole,
            AuditAction::LockUser,
            AuditAction::UnlockUser,
            AuditAction::DeleteUser,
            AuditAction::ChangePassword,
            AuditAction::AccessDenied,
            AuditAction::LoginFailed,
            AuditAction::BruteForce,
        ];
        for action in actions {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(AuditAction::parse("NOT_AN_ACTION"), None);
    }

    #[test]
    fn action_serializes_screaming_snake() {
        let json = serde_json::to_string(&AuditAction::BruteForce).unwrap();
        assert_eq!(json, "\"BRUTE_FORCE\"");
    }

    #[tokio::test]
    async fn toggle_role_formats_objects() {
        let stores = Stores::memory();
        let logger = AuditLogger::new(stores.audit.clone());

        logger
            .toggle_role("admin@acme.com", true, "accountant", "max@acme.com")
            .await
            .unwrap();
        logger
            .toggle_role("admin@acme.com", false, "accountant", "max@acme.com")
            .await
            .unwrap();

        let events = logger.events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::GrantRole);
        assert_eq!(events[0].object, "Grant role ACCOUNTANT to max@acme.com");
        assert_eq!(events[1].action, AuditAction::RemoveRole);
        assert_eq!(events[1].object, "Remove role ACCOUNTANT from max@acme.com");
    }

    #[tokio::test]
    async fn brute_force_writes_event_pair() {
        let stores = Stores::memory();
        let logger = AuditLogger::new(stores.audit.clone());

        logger.brute_force("max@acme.com", "/api/empl/payment").await.unwrap();

        let events = logger.events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::BruteForce);
        assert_eq!(events[1].action, AuditAction::LockUser);
        assert_eq!(events[1].subject, "max@acme.com");
        assert_eq!(events[1].object, "max@acme.com");
        assert!(events[0].id < events[1].id);
    }
}

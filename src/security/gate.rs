//! Authentication gate: breach check first, then credential verification
//! against the store, with every rejection recorded by the protector before
//! the response leaves.

use std::sync::Arc;

use crate::error::DomainError;
use crate::store::{RoleStore, UserRecord, UserStore};

use super::breach::is_breached;
use super::{BruteForceProtector, CredentialHasher};

pub const PASSWORD_HACKED_ERRORMSG: &str =
    "The password is in the hacker's database! Please change!";
pub const INVALID_CREDENTIALS_ERRORMSG: &str = "Invalid credentials";
pub const ACCOUNT_LOCKED_ERRORMSG: &str = "User account is locked";

/// Verified identity plus its role set, as handed to the authorizers.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: UserRecord,
    pub roles: Vec<String>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|held| held == role)
    }
}

pub struct AuthGate {
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    hasher: Arc<CredentialHasher>,
    protector: BruteForceProtector,
}

impl AuthGate {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        hasher: Arc<CredentialHasher>,
        protector: BruteForceProtector,
    ) -> Self {
        Self {
            users,
            roles,
            hasher,
            protector,
        }
    }

    /// Verifies `email` / `password` for a request on `path`.
    ///
    /// A breached password is rejected before any lookup, even when it would
    /// verify, and still counts as a failure. Unknown identities burn a
    /// verification against a dummy hash so the miss is not cheaper than a
    /// mismatch. All failure events are durable before this returns.
    ///
    /// # Errors
    /// `Unauthorized` for every rejection; `Store` when the backing store
    /// fails.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        path: &str,
    ) -> Result<AuthenticatedUser, DomainError> {
        if is_breached(password) {
            self.protector.record_failure(email, path).await?;
            return Err(DomainError::Unauthorized(
                PASSWORD_HACKED_ERRORMSG.to_string(),
            ));
        }

        let Some(user) = self.users.find(email).await? else {
            self.hasher.verify_dummy(password);
            self.protector.record_failure(email, path).await?;
            return Err(DomainError::Unauthorized(
                INVALID_CREDENTIALS_ERRORMSG.to_string(),
            ));
        };

        if user.locked {
            self.protector.record_failure(email, path).await?;
            return Err(DomainError::Unauthorized(
                ACCOUNT_LOCKED_ERRORMSG.to_string(),
            ));
        }

        if !self.hasher.verify(password, &user.password_hash) {
            self.protector.record_failure(email, path).await?;
            return Err(DomainError::Unauthorized(
                INVALID_CREDENTIALS_ERRORMSG.to_string(),
            ));
        }

        // Success path: counter reset failures are logged, never surfaced.
        self.protector.reset(&user.email).await;
        let roles = self.roles.roles_of(&user.email).await?;
        Ok(AuthenticatedUser { user, roles })
    }
}

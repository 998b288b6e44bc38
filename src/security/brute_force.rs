//! Per-identity lockout machine over the user store's atomic counter.
//!
//! The store does the read-modify-write; this type decides which audit
//! events the outcome produces. The LOGIN_FAILED, BRUTE_FORCE, LOCK_USER
//! triple is written by exactly one request per contiguous lockout, the one
//! whose compare-and-set on the lock flag succeeds.

use std::sync::Arc;

use tracing::warn;

use crate::audit::AuditLogger;
use crate::store::{StoreResult, UserStore};

use super::SecurityConfig;

pub struct BruteForceProtector {
    users: Arc<dyn UserStore>,
    audit: AuditLogger,
    limit: i32,
}

impl BruteForceProtector {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, audit: AuditLogger, config: SecurityConfig) -> Self {
        Self {
            users,
            audit,
            limit: config.login_failed_limit(),
        }
    }

    /// Records one authentication failure for `email` observed on `path`.
    ///
    /// Unknown and already-locked identities get a single LOGIN_FAILED event
    /// and no counter change. Active identities get an atomic increment; at
    /// the limit the caller races for the lock flag and only the winner
    /// appends the BRUTE_FORCE and LOCK_USER tail.
    pub async fn record_failure(&self, email: &str, path: &str) -> StoreResult<()> {
        let state = match self.users.increment_failed(email).await? {
            None => {
                self.audit.login_failed(email, path).await?;
                return Ok(());
            }
            Some(state) => state,
        };

        if state.locked || state.failed_logins < self.limit {
            self.audit.login_failed(email, path).await?;
            return Ok(());
        }

        let won_lock = self.users.lock_for_brute_force(email).await?;
        self.audit.login_failed(email, path).await?;
        if won_lock {
            self.audit.brute_force(email, path).await?;
        }
        Ok(())
    }

    /// Clears the failure counter after a successful authentication. Store
    /// failures here must not fail the login, so they are only logged.
    pub async fn reset(&self, email: &str) {
        if let Err(err) = self.users.reset_failed(email).await {
            warn!("could not reset failed-login counter for {email}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditAction;
    use crate::store::{NewUser, Stores};

    const PATH: &str = "/api/empl/payment";

    fn protector(stores: &Stores, limit: i32) -> BruteForceProtector {
        BruteForceProtector::new(
            stores.users.clone(),
            AuditLogger::new(stores.audit.clone()),
            SecurityConfig::new().with_login_failed_limit(limit),
        )
    }

    async fn seed_user(stores: &Stores, email: &str) {
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
    }

    #[tokio::test]
    async fn locks_after_exactly_limit_failures() {
        let stores = Stores::memory();
        seed_user(&stores, "max@acme.com").await;
        let protector = protector(&stores, 5);

        for _ in 0..5 {
            protector.record_failure("max@acme.com", PATH).await.unwrap();
        }

        let user = stores.users.find("max@acme.com").await.unwrap().unwrap();
        assert!(user.locked);

        let events = stores.audit.events().await.unwrap();
        let count = |action: AuditAction| events.iter().filter(|e| e.action == action).count();
        assert_eq!(count(AuditAction::LoginFailed), 5);
        assert_eq!(count(AuditAction::BruteForce), 1);
        assert_eq!(count(AuditAction::LockUser), 1);

        // The tail is ordered LOGIN_FAILED, BRUTE_FORCE, LOCK_USER.
        let tail: Vec<AuditAction> = events.iter().rev().take(3).map(|e| e.action).collect();
        assert_eq!(
            tail,
            vec![
                AuditAction::LockUser,
                AuditAction::BruteForce,
                AuditAction::LoginFailed
            ]
        );
        let lock = events.last().unwrap();
        assert_eq!(lock.subject, "max@acme.com");
        assert_eq!(lock.object, "max@acme.com");
    }

    #[tokio::test]
    async fn failures_after_lock_stay_single_events() {
        let stores = Stores::memory();
        seed_user(&stores, "max@acme.com").await;
        let protector = protector(&stores, 2);

        for _ in 0..4 {
            protector.record_failure("max@acme.com", PATH).await.unwrap();
        }

        let events = stores.audit.events().await.unwrap();
        let brute_force = events
            .iter()
            .filter(|e| e.action == AuditAction::BruteForce)
            .count();
        assert_eq!(brute_force, 1);
        assert_eq!(
            events
                .iter()
                .filter(|e| e.action == AuditAction::LoginFailed)
                .count(),
            4
        );
    }

    #[tokio::test]
    async fn unknown_identity_writes_one_event_only() {
        let stores = Stores::memory();
        let protector = protector(&stores, 5);

        protector.record_failure("ghost@acme.com", PATH).await.unwrap();

        let events = stores.audit.events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AuditAction::LoginFailed);
        assert_eq!(events[0].subject, "ghost@acme.com");
    }

    #[tokio::test]
    async fn reset_clears_counter() {
        let stores = Stores::memory();
        seed_user(&stores, "max@acme.com").await;
        let protector = protector(&stores, 5);

        for _ in 0..3 {
            protector.record_failure("max@acme.com", PATH).await.unwrap();
        }
        protector.reset("max@acme.com").await;

        let user = stores.users.find("max@acme.com").await.unwrap().unwrap();
        assert_eq!(user.failed_logins, 0);
        assert!(!user.locked);
    }
}

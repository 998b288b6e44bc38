//! Storage seams for the account, role, audit, and payroll collaborators.
//!
//! The services only ever talk to these traits; the Postgres implementation
//! backs the server, the in-memory one backs the tests. Per-identity
//! read-modify-write operations (failure counting, brute-force locking) are
//! atomic at the store level so concurrent requests for the same identity
//! cannot double-fire a lockout.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::audit::{AuditEvent, NewAuditEvent};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-key violation on insert.
    #[error("duplicate key")]
    Duplicate,

    /// The backing store could not complete the operation.
    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted user identity.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub password_hash: String,
    pub locked: bool,
    pub failed_logins: i32,
}

/// Fields needed to create an identity; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub password_hash: String,
}

/// Snapshot returned by the atomic failure increment.
#[derive(Debug, Clone, Copy)]
pub struct FailureCount {
    pub failed_logins: i32,
    pub locked: bool,
}

/// One payroll row; `period` is stored year-first ("yyyy-mm") so the natural
/// string ordering is the chronological one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalaryRow {
    pub employee: String,
    pub period: String,
    pub monthly_salary: i64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn count(&self) -> StoreResult<i64>;

    /// Case-insensitive lookup by email.
    async fn find(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    /// All users ascending by id.
    async fn list(&self) -> StoreResult<Vec<UserRecord>>;

    /// Returns `StoreError::Duplicate` when the email is already taken
    /// (case-insensitively).
    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord>;

    async fn update_password(&self, email: &str, password_hash: &str) -> StoreResult<()>;

    /// Admin lock toggle; also resets the failure counter to zero.
    async fn set_locked(&self, email: &str, locked: bool) -> StoreResult<()>;

    /// Atomically increments the failure counter unless the account is
    /// locked. Returns `None` for unknown identities, otherwise the counter
    /// value after the call and the lock flag.
    async fn increment_failed(&self, email: &str) -> StoreResult<Option<FailureCount>>;

    async fn reset_failed(&self, email: &str) -> StoreResult<()>;

    /// Compare-and-set lock transition for brute-force handling. Returns
    /// `true` only for the caller that actually flipped the flag, so a
    /// contiguous lockout is attributed to exactly one request.
    async fn lock_for_brute_force(&self, email: &str) -> StoreResult<bool>;

    /// Cascade-deletes role assignments, payroll rows, and the identity row,
    /// in that order, atomically where the backend supports it.
    async fn delete_account(&self, email: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// The roles known to the system, read per check rather than cached at
    /// startup.
    async fn system_roles(&self) -> StoreResult<Vec<String>>;

    async fn roles_of(&self, email: &str) -> StoreResult<Vec<String>>;

    async fn grant(&self, email: &str, role: &str) -> StoreResult<()>;

    async fn revoke(&self, email: &str, role: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Appends one event; the store assigns the monotonic sequence id and
    /// the timestamp. Events are never mutated or deleted.
    async fn append(&self, event: NewAuditEvent) -> StoreResult<AuditEvent>;

    /// All events ascending by sequence id.
    async fn events(&self) -> StoreResult<Vec<AuditEvent>>;
}

#[async_trait]
pub trait PayrollStore: Send + Sync {
    async fn find_for_period(&self, employee: &str, period: &str)
        -> StoreResult<Option<SalaryRow>>;

    /// All rows for one employee, ascending by period.
    async fn list_for(&self, employee: &str) -> StoreResult<Vec<SalaryRow>>;

    /// Inserts the batch all-or-none; `StoreError::Duplicate` when any row
    /// collides with an existing employee + period pair.
    async fn insert_all(&self, rows: Vec<SalaryRow>) -> StoreResult<u64>;

    /// Returns `false` when no row matched the employee + period pair.
    async fn update(&self, employee: &str, period: &str, monthly_salary: i64) -> StoreResult<bool>;
}

/// Bundle of the store handles the services are built from.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub roles: Arc<dyn RoleStore>,
    pub audit: Arc<dyn AuditStore>,
    pub payroll: Arc<dyn PayrollStore>,
}

impl Stores {
    /// In-memory stores sharing one state; used by tests.
    #[must_use]
    pub fn memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Self {
            users: store.clone(),
            roles: store.clone(),
            audit: store.clone(),
            payroll: store,
        }
    }

    /// Postgres-backed stores sharing one pool.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(postgres::PgStore::new(pool));
        Self {
            users: store.clone(),
            roles: store.clone(),
            audit: store.clone(),
            payroll: store,
        }
    }
}

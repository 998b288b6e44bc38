//! In-memory store backing the test suites.
//!
//! One mutex guards all tables, so every trait operation is atomic per call,
//! which is exactly the read-modify-write guarantee the security core needs
//! from a real backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::audit::{AuditEvent, NewAuditEvent};

use super::{
    AuditStore, FailureCount, NewUser, PayrollStore, RoleStore, SalaryRow, StoreError, StoreResult,
    UserRecord, UserStore,
};

/// Roles seeded into every fresh store, mirroring the system role table.
pub const SYSTEM_ROLES: [&str; 4] = [
    "ROLE_ADMINISTRATOR",
    "ROLE_USER",
    "ROLE_ACCOUNTANT",
    "ROLE_AUDITOR",
];

#[derive(Default)]
struct Inner {
    next_user_id: i64,
    next_event_id: i64,
    /// Keyed by lower-cased email; records keep the email as signed up.
    users: HashMap<String, UserRecord>,
    /// Lower-cased email to granted role names.
    roles: HashMap<String, Vec<String>>,
    events: Vec<AuditEvent>,
    /// (lower-cased employee, year-first period) to salary row.
    payroll: HashMap<(String, String), SalaryRow>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_user_id: 1,
                next_event_id: 1,
                ..Inner::default()
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn key(email: &str) -> String {
    email.to_lowercase()
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn count(&self) -> StoreResult<i64> {
        let inner = self.inner.lock().await;
        Ok(inner.users.len() as i64)
    }

    async fn find(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(&key(email)).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<UserRecord>> {
        let inner = self.inner.lock().await;
        let mut users: Vec<UserRecord> = inner.users.values().cloned().collect();
        users.sort_by_key(|user| user.id);
        Ok(users)
    }

    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord> {
        let mut inner = self.inner.lock().await;
        let email_key = key(&user.email);
        if inner.users.contains_key(&email_key) {
            return Err(StoreError::Duplicate);
        }
        let id = inner.next_user_id;
        inner.next_user_id += 1;
        let record = UserRecord {
            id,
            name: user.name,
            lastname: user.lastname,
            email: user.email,
            password_hash: user.password_hash,
            locked: false,
            failed_logins: 0,
        };
        inner.users.insert(email_key, record.clone());
        Ok(record)
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&key(email)) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn set_locked(&self, email: &str, locked: bool) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&key(email)) {
            user.locked = locked;
            user.failed_logins = 0;
        }
        Ok(())
    }

    async fn increment_failed(&self, email: &str) -> StoreResult<Option<FailureCount>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.users.get_mut(&key(email)).map(|user| {
            if !user.locked {
                user.failed_logins += 1;
            }
            FailureCount {
                failed_logins: user.failed_logins,
                locked: user.locked,
            }
        }))
    }

    async fn reset_failed(&self, email: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&key(email)) {
            user.failed_logins = 0;
        }
        Ok(())
    }

    async fn lock_for_brute_force(&self, email: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.users.get_mut(&key(email)) {
            Some(user) if !user.locked => {
                user.locked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_account(&self, email: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let email_key = key(email);
        inner.roles.remove(&email_key);
        inner
            .payroll
            .retain(|(employee, _), _| *employee != email_key);
        inner.users.remove(&email_key);
        Ok(())
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn system_roles(&self) -> StoreResult<Vec<String>> {
        Ok(SYSTEM_ROLES.iter().map(ToString::to_string).collect())
    }

    async fn roles_of(&self, email: &str) -> StoreResult<Vec<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.roles.get(&key(email)).cloned().unwrap_or_default())
    }

    async fn grant(&self, email: &str, role: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let roles = inner.roles.entry(key(email)).or_default();
        if !roles.iter().any(|held| held == role) {
            roles.push(role.to_string());
        }
        Ok(())
    }

    async fn revoke(&self, email: &str, role: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(roles) = inner.roles.get_mut(&key(email)) {
            roles.retain(|held| held != role);
        }
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, event: NewAuditEvent) -> StoreResult<AuditEvent> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_event_id;
        inner.next_event_id += 1;
        let event = AuditEvent {
            id,
            at: Utc::now(),
            action: event.action,
            subject: event.subject,
            object: event.object,
            path: event.path,
        };
        inner.events.push(event.clone());
        Ok(event)
    }

    async fn events(&self) -> StoreResult<Vec<AuditEvent>> {
        let inner = self.inner.lock().await;
        Ok(inner.events.clone())
    }
}

#[async_trait]
impl PayrollStore for MemoryStore {
    async fn find_for_period(
        &self,
        employee: &str,
        period: &str,
    ) -> StoreResult<Option<SalaryRow>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .payroll
            .get(&(key(employee), period.to_string()))
            .cloned())
    }

    async fn list_for(&self, employee: &str) -> StoreResult<Vec<SalaryRow>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<SalaryRow> = inner
            .payroll
            .iter()
            .filter(|((owner, _), _)| *owner == key(employee))
            .map(|(_, row)| row.clone())
            .collect();
        rows.sort_by(|a, b| a.period.cmp(&b.period));
        Ok(rows)
    }

    async fn insert_all(&self, rows: Vec<SalaryRow>) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        // All-or-none: check every key before touching the table.
        for row in &rows {
            if inner
                .payroll
                .contains_key(&(key(&row.employee), row.period.clone()))
            {
                return Err(StoreError::Duplicate);
            }
        }
        let count = rows.len() as u64;
        for row in rows {
            inner
                .payroll
                .insert((key(&row.employee), row.period.clone()), row);
        }
        Ok(count)
    }

    async fn update(&self, employee: &str, period: &str, monthly_salary: i64) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.payroll.get_mut(&(key(employee), period.to_string())) {
            Some(row) => {
                row.monthly_salary = monthly_salary;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

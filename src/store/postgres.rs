//! Postgres implementation of the store seams.
//!
//! Failure counting and the brute-force lock transition are single-statement
//! updates, so they stay atomic per identity without advisory locks. The
//! account cascade runs inside one transaction.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;

use crate::audit::{AuditAction, AuditEvent, NewAuditEvent};

use super::{
    AuditStore, FailureCount, NewUser, PayrollStore, RoleStore, SalaryRow, StoreError, StoreResult,
    UserRecord, UserStore,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn unavailable(err: sqlx::Error, what: &str) -> StoreError {
    StoreError::Unavailable(anyhow!(err).context(format!("failed to {what}")))
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        name: row.get("name"),
        lastname: row.get("lastname"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        locked: row.get("locked"),
        failed_logins: row.get("failed_logins"),
    }
}

fn event_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<AuditEvent> {
    let action: String = row.get("action");
    let action = AuditAction::parse(&action)
        .ok_or_else(|| StoreError::Unavailable(anyhow!("unknown audit action: {action}")))?;
    let at: DateTime<Utc> = row.get("occurred_at");
    Ok(AuditEvent {
        id: row.get("id"),
        at,
        action,
        subject: row.get("subject"),
        object: row.get("object"),
        path: row.get("path"),
    })
}

#[async_trait]
impl UserStore for PgStore {
    async fn count(&self) -> StoreResult<i64> {
        let query = "SELECT COUNT(*) AS total FROM login";
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .map_err(|err| unavailable(err, "count users"))?;
        Ok(row.get("total"))
    }

    async fn find(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let query = r"
            SELECT id, name, lastname, email, password_hash, locked, failed_logins
            FROM login
            WHERE LOWER(email) = LOWER($1)
        ";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .map_err(|err| unavailable(err, "lookup user"))?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn list(&self) -> StoreResult<Vec<UserRecord>> {
        let query = r"
            SELECT id, name, lastname, email, password_hash, locked, failed_logins
            FROM login
            ORDER BY id ASC
        ";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .map_err(|err| unavailable(err, "list users"))?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord> {
        let query = r"
            INSERT INTO login (name, lastname, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, lastname, email, password_hash, locked, failed_logins
        ";
        let row = sqlx::query(query)
            .bind(&user.name)
            .bind(&user.lastname)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;
        match row {
            Ok(row) => Ok(user_from_row(&row)),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Duplicate),
            Err(err) => Err(unavailable(err, "insert user")),
        }
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> StoreResult<()> {
        let query = r"
            UPDATE login SET password_hash = $2
            WHERE LOWER(email) = LOWER($1)
        ";
        sqlx::query(query)
            .bind(email)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .map_err(|err| unavailable(err, "update password"))?;
        Ok(())
    }

    async fn set_locked(&self, email: &str, locked: bool) -> StoreResult<()> {
        let query = r"
            UPDATE login SET locked = $2, failed_logins = 0
            WHERE LOWER(email) = LOWER($1)
        ";
        sqlx::query(query)
            .bind(email)
            .bind(locked)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .map_err(|err| unavailable(err, "toggle user lock"))?;
        Ok(())
    }

    async fn increment_failed(&self, email: &str) -> StoreResult<Option<FailureCount>> {
        // The increment only applies to active accounts; locked ones fall
        // through to the plain read so callers still see their state.
        let query = r"
            UPDATE login SET failed_logins = failed_logins + 1
            WHERE LOWER(email) = LOWER($1) AND NOT locked
            RETURNING failed_logins
        ";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .map_err(|err| unavailable(err, "increment failed logins"))?;

        if let Some(row) = row {
            return Ok(Some(FailureCount {
                failed_logins: row.get("failed_logins"),
                locked: false,
            }));
        }

        let query = r"
            SELECT failed_logins, locked FROM login
            WHERE LOWER(email) = LOWER($1)
        ";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .map_err(|err| unavailable(err, "read failed logins"))?;
        Ok(row.map(|row| FailureCount {
            failed_logins: row.get("failed_logins"),
            locked: row.get("locked"),
        }))
    }

    async fn reset_failed(&self, email: &str) -> StoreResult<()> {
        let query = r"
            UPDATE login SET failed_logins = 0
            WHERE LOWER(email) = LOWER($1)
        ";
        sqlx::query(query)
            .bind(email)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .map_err(|err| unavailable(err, "reset failed logins"))?;
        Ok(())
    }

    async fn lock_for_brute_force(&self, email: &str) -> StoreResult<bool> {
        // Compare-and-set: only one concurrent request observes a row change.
        let query = r"
            UPDATE login SET locked = TRUE
            WHERE LOWER(email) = LOWER($1) AND NOT locked
        ";
        let result = sqlx::query(query)
            .bind(email)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .map_err(|err| unavailable(err, "lock user"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_account(&self, email: &str) -> StoreResult<()> {
        // One transaction so a crash cannot leave orphaned role or payroll
        // rows referencing a deleted identity.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| unavailable(err, "begin delete transaction"))?;

        for query in [
            "DELETE FROM login_role WHERE LOWER(email) = LOWER($1)",
            "DELETE FROM salary WHERE LOWER(employee) = LOWER($1)",
            "DELETE FROM login WHERE LOWER(email) = LOWER($1)",
        ] {
            sqlx::query(query)
                .bind(email)
                .execute(&mut *tx)
                .instrument(query_span("DELETE", query))
                .await
                .map_err(|err| unavailable(err, "cascade delete account"))?;
        }

        tx.commit()
            .await
            .map_err(|err| unavailable(err, "commit delete transaction"))?;
        Ok(())
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn system_roles(&self) -> StoreResult<Vec<String>> {
        let query = "SELECT role_name FROM role ORDER BY id ASC";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .map_err(|err| unavailable(err, "list system roles"))?;
        Ok(rows.iter().map(|row| row.get("role_name")).collect())
    }

    async fn roles_of(&self, email: &str) -> StoreResult<Vec<String>> {
        let query = r"
            SELECT role FROM login_role
            WHERE LOWER(email) = LOWER($1)
            ORDER BY role ASC
        ";
        let rows = sqlx::query(query)
            .bind(email)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .map_err(|err| unavailable(err, "list user roles"))?;
        Ok(rows.iter().map(|row| row.get("role")).collect())
    }

    async fn grant(&self, email: &str, role: &str) -> StoreResult<()> {
        let query = r"
            INSERT INTO login_role (email, role)
            VALUES ($1, $2)
            ON CONFLICT (email, role) DO NOTHING
        ";
        sqlx::query(query)
            .bind(email)
            .bind(role)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .map_err(|err| unavailable(err, "grant role"))?;
        Ok(())
    }

    async fn revoke(&self, email: &str, role: &str) -> StoreResult<()> {
        let query = r"
            DELETE FROM login_role
            WHERE LOWER(email) = LOWER($1) AND role = $2
        ";
        sqlx::query(query)
            .bind(email)
            .bind(role)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .map_err(|err| unavailable(err, "revoke role"))?;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append(&self, event: NewAuditEvent) -> StoreResult<AuditEvent> {
        let query = r"
            INSERT INTO security_event (action, subject, object, path)
            VALUES ($1, $2, $3, $4)
            RETURNING id, occurred_at, action, subject, object, path
        ";
        let row = sqlx::query(query)
            .bind(event.action.as_str())
            .bind(&event.subject)
            .bind(&event.object)
            .bind(&event.path)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .map_err(|err| unavailable(err, "append audit event"))?;
        event_from_row(&row)
    }

    async fn events(&self) -> StoreResult<Vec<AuditEvent>> {
        let query = r"
            SELECT id, occurred_at, action, subject, object, path
            FROM security_event
            ORDER BY id ASC
        ";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .map_err(|err| unavailable(err, "list audit events"))?;
        rows.iter().map(event_from_row).collect()
    }
}

#[async_trait]
impl PayrollStore for PgStore {
    async fn find_for_period(
        &self,
        employee: &str,
        period: &str,
    ) -> StoreResult<Option<SalaryRow>> {
        let query = r"
            SELECT employee, period, monthly_salary FROM salary
            WHERE LOWER(employee) = LOWER($1) AND period = $2
        ";
        let row = sqlx::query(query)
            .bind(employee)
            .bind(period)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .map_err(|err| unavailable(err, "lookup salary record"))?;
        Ok(row.map(|row| SalaryRow {
            employee: row.get("employee"),
            period: row.get("period"),
            monthly_salary: row.get("monthly_salary"),
        }))
    }

    async fn list_for(&self, employee: &str) -> StoreResult<Vec<SalaryRow>> {
        let query = r"
            SELECT employee, period, monthly_salary FROM salary
            WHERE LOWER(employee) = LOWER($1)
            ORDER BY period ASC
        ";
        let rows = sqlx::query(query)
            .bind(employee)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .map_err(|err| unavailable(err, "list salary records"))?;
        Ok(rows
            .iter()
            .map(|row| SalaryRow {
                employee: row.get("employee"),
                period: row.get("period"),
                monthly_salary: row.get("monthly_salary"),
            })
            .collect())
    }

    async fn insert_all(&self, rows: Vec<SalaryRow>) -> StoreResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| unavailable(err, "begin payroll transaction"))?;

        let query = r"
            INSERT INTO salary (employee, period, monthly_salary)
            VALUES ($1, $2, $3)
        ";
        let count = rows.len() as u64;
        for row in rows {
            let result = sqlx::query(query)
                .bind(&row.employee)
                .bind(&row.period)
                .bind(row.monthly_salary)
                .execute(&mut *tx)
                .instrument(query_span("INSERT", query))
                .await;
            match result {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    let _ = tx.rollback().await;
                    return Err(StoreError::Duplicate);
                }
                Err(err) => {
                    let _ = tx.rollback().await;
                    return Err(unavailable(err, "insert salary record"));
                }
            }
        }

        tx.commit()
            .await
            .map_err(|err| unavailable(err, "commit payroll transaction"))?;
        Ok(count)
    }

    async fn update(&self, employee: &str, period: &str, monthly_salary: i64) -> StoreResult<bool> {
        let query = r"
            UPDATE salary SET monthly_salary = $3
            WHERE LOWER(employee) = LOWER($1) AND period = $2
        ";
        let result = sqlx::query(query)
            .bind(employee)
            .bind(period)
            .bind(monthly_salary)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .map_err(|err| unavailable(err, "update salary record"))?;
        Ok(result.rows_affected() == 1)
    }
}

/// Connect and run pending migrations.
///
/// # Errors
/// Returns an error if the pool cannot connect or a migration fails.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    Ok(())
}

//! Payroll records: batch upload, single update, and the employee's own
//! salary listing.
//!
//! Periods arrive month-first ("mm-yyyy") and are stored year-first
//! ("yyyy-mm") so the natural string order is chronological. Responses spell
//! the month out ("January-2023") and render the salary in dollars and cents.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::DomainError;
use crate::store::{PayrollStore, SalaryRow, StoreError, UserRecord, UserStore};

use super::validate::{is_valid_email, is_valid_period};

pub const NO_SUCH_EMPLOYEE_ERRORMSG: &str = "No such employee registered!";
pub const NO_SUCH_SALARY_RECORD_ERRORMSG: &str =
    "No such record found for this employee and period!";
pub const RECORD_ALREADY_EXISTS_ERRORMSG: &str =
    "A record already exists for this employee and period! Use PUT!";
pub const DUPLICATE_RECORDS_ERRORMSG: &str =
    "Duplicate record for same employee and period provided!";
pub const WRONG_PERIOD_PARAM_ERRORMSG: &str = "Wrong Date: Use mm-yyyy format!";
pub const WRONG_PERIOD_ERRORMSG: &str = "Wrong date!";
pub const NEGATIVE_SALARY_ERRORMSG: &str = "Salary must be non negative!";
pub const ADDED_SUCCESSFULLY: &str = "Added successfully!";
pub const UPDATED_SUCCESSFULLY: &str = "Updated successfully!";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SalaryRecord {
    pub employee: String,
    /// Month-first, "mm-yyyy".
    pub period: String,
    /// Salary in cents.
    pub salary: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SalaryView {
    pub name: String,
    pub lastname: String,
    /// Spelled out, "January-2023".
    pub period: String,
    /// "1234 dollar(s) 56 cent(s)".
    pub salary: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayrollStatus {
    pub status: String,
}

pub struct PayrollService {
    users: Arc<dyn UserStore>,
    payroll: Arc<dyn PayrollStore>,
}

impl PayrollService {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, payroll: Arc<dyn PayrollStore>) -> Self {
        Self { users, payroll }
    }

    /// Batch upload, all-or-none. Each invalid record contributes an indexed
    /// message; the batch is rejected as a whole when any record fails.
    ///
    /// # Errors
    /// `Validation` with `" | "`-joined record messages, `Conflict` for
    /// in-batch duplicates or collisions with stored rows.
    pub async fn upload(&self, records: Vec<SalaryRecord>) -> Result<PayrollStatus, DomainError> {
        let mut violations = Vec::new();
        for (index, record) in records.iter().enumerate() {
            if let Some(message) = self.validate_record(record).await? {
                violations.push(format!("Record {index}: {message}"));
            }
        }
        if !violations.is_empty() {
            return Err(DomainError::Validation(violations.join(" | ")));
        }

        let mut seen = HashSet::new();
        for record in &records {
            let key = (record.employee.to_lowercase(), year_first(&record.period));
            if !seen.insert(key) {
                return Err(DomainError::Conflict(
                    DUPLICATE_RECORDS_ERRORMSG.to_string(),
                ));
            }
        }

        let rows: Vec<SalaryRow> = records
            .into_iter()
            .map(|record| SalaryRow {
                period: year_first(&record.period),
                employee: record.employee,
                monthly_salary: record.salary,
            })
            .collect();
        let count = self.payroll.insert_all(rows).await.map_err(|err| match err {
            StoreError::Duplicate => {
                DomainError::Conflict(RECORD_ALREADY_EXISTS_ERRORMSG.to_string())
            }
            other => DomainError::Store(other),
        })?;
        Ok(PayrollStatus {
            status: format!("{count} records {ADDED_SUCCESSFULLY}"),
        })
    }

    /// Replaces the salary for an existing employee and period pair.
    ///
    /// # Errors
    /// `Validation` for malformed records, `Conflict` when no row matches.
    pub async fn update(&self, record: SalaryRecord) -> Result<PayrollStatus, DomainError> {
        if let Some(message) = validate_format(&record) {
            return Err(DomainError::Validation(message));
        }
        let updated = self
            .payroll
            .update(&record.employee, &year_first(&record.period), record.salary)
            .await?;
        if !updated {
            return Err(DomainError::Conflict(
                NO_SUCH_SALARY_RECORD_ERRORMSG.to_string(),
            ));
        }
        Ok(PayrollStatus {
            status: UPDATED_SUCCESSFULLY.to_string(),
        })
    }

    /// The authenticated employee's own records, ascending by period, or a
    /// single record when `period` is given.
    ///
    /// # Errors
    /// `Validation` when the period filter is malformed.
    pub async fn list(
        &self,
        user: &UserRecord,
        period: Option<&str>,
    ) -> Result<Vec<SalaryView>, DomainError> {
        let rows = match period {
            Some(period) if !is_valid_period(period) => {
                return Err(DomainError::Validation(
                    WRONG_PERIOD_PARAM_ERRORMSG.to_string(),
                ));
            }
            Some(period) => self
                .payroll
                .find_for_period(&user.email, &year_first(period))
                .await?
                .into_iter()
                .collect(),
            None => self.payroll.list_for(&user.email).await?,
        };
        Ok(rows
            .into_iter()
            .map(|row| SalaryView {
                name: user.name.clone(),
                lastname: user.lastname.clone(),
                period: month_first(&row.period),
                salary: salary_text(row.monthly_salary),
            })
            .collect())
    }

    async fn validate_record(
        &self,
        record: &SalaryRecord,
    ) -> Result<Option<String>, DomainError> {
        if let Some(message) = validate_format(record) {
            return Ok(Some(message));
        }
        // Only well-formed records are checked against the store.
        if self.users.find(&record.employee).await?.is_none() {
            return Ok(Some(NO_SUCH_EMPLOYEE_ERRORMSG.to_string()));
        }
        let existing = self
            .payroll
            .find_for_period(&record.employee, &year_first(&record.period))
            .await?;
        if existing.is_some() {
            return Ok(Some(RECORD_ALREADY_EXISTS_ERRORMSG.to_string()));
        }
        Ok(None)
    }
}

fn validate_format(record: &SalaryRecord) -> Option<String> {
    let mut violations = Vec::new();
    if !is_valid_email(&record.employee) {
        violations.push(super::validate::INVALID_EMAIL_ERRORMSG);
    }
    if !is_valid_period(&record.period) {
        violations.push(WRONG_PERIOD_ERRORMSG);
    }
    if record.salary < 0 {
        violations.push(NEGATIVE_SALARY_ERRORMSG);
    }
    if violations.is_empty() {
        None
    } else {
        Some(violations.join(" && "))
    }
}

/// "mm-yyyy" to the stored "yyyy-mm". Input must already be validated.
fn year_first(period: &str) -> String {
    format!("{}-{}", &period[3..], &period[..2])
}

/// Stored "yyyy-mm" to the spelled-out "Month-yyyy".
fn month_first(period: &str) -> String {
    let month = period[5..].parse::<usize>().unwrap_or(0);
    let name = MONTH_NAMES.get(month.wrapping_sub(1)).unwrap_or(&"?");
    format!("{}-{}", name, &period[..4])
}

fn salary_text(cents: i64) -> String {
    format!("{} dollar(s) {:02} cent(s)", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewUser, Stores};

    async fn seed_user(stores: &Stores, email: &str) -> UserRecord {
        stores
            .users
            .insert(NewUser {
                name: "John".to_string(),
                lastname: "Doe".to_string(),
                email: email.to_string(),
                password_hash: "$argon2id$stub".to_string(),
            })
            .await
            .unwrap()
    }

    fn record(employee: &str, period: &str, salary: i64) -> SalaryRecord {
        SalaryRecord {
            employee: employee.to_string(),
            period: period.to_string(),
            salary,
        }
    }

    #[tokio::test]
    async fn upload_then_list_spells_out_month_and_salary() {
        let stores = Stores::memory();
        let user = seed_user(&stores, "john@acme.com").await;
        let service = PayrollService::new(stores.users.clone(), stores.payroll.clone());

        let status = service
            .upload(vec![
                record("john@acme.com", "01-2023", 123_456),
                record("john@acme.com", "02-2023", 123_456),
            ])
            .await
            .unwrap();
        assert_eq!(status.status, "2 records Added successfully!");

        let views = service.list(&user, None).await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].period, "January-2023");
        assert_eq!(views[0].salary, "1234 dollar(s) 56 cent(s)");
    }

    #[tokio::test]
    async fn upload_rejects_invalid_records_with_index() {
        let stores = Stores::memory();
        seed_user(&stores, "john@acme.com").await;
        let service = PayrollService::new(stores.users.clone(), stores.payroll.clone());

        let err = service
            .upload(vec![
                record("john@acme.com", "01-2023", 1000),
                record("ghost@acme.com", "13-2023", -5),
            ])
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Record 1:"));
        assert!(message.contains(WRONG_PERIOD_ERRORMSG));
        assert!(message.contains(NEGATIVE_SALARY_ERRORMSG));

        // All-or-none: the valid record must not have been stored.
        let rows = stores.payroll.list_for("john@acme.com").await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn upload_rejects_unknown_employee() {
        let stores = Stores::memory();
        let service = PayrollService::new(stores.users.clone(), stores.payroll.clone());

        let err = service
            .upload(vec![record("ghost@acme.com", "01-2023", 1000)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains(NO_SUCH_EMPLOYEE_ERRORMSG));
    }

    #[tokio::test]
    async fn upload_rejects_in_batch_duplicates() {
        let stores = Stores::memory();
        seed_user(&stores, "john@acme.com").await;
        let service = PayrollService::new(stores.users.clone(), stores.payroll.clone());

        let err = service
            .upload(vec![
                record("john@acme.com", "01-2023", 1000),
                record("John@ACME.com", "01-2023", 2000),
            ])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), DUPLICATE_RECORDS_ERRORMSG);
    }

    #[tokio::test]
    async fn update_requires_existing_row() {
        let stores = Stores::memory();
        seed_user(&stores, "john@acme.com").await;
        let service = PayrollService::new(stores.users.clone(), stores.payroll.clone());

        let err = service
            .update(record("john@acme.com", "01-2023", 1000))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), NO_SUCH_SALARY_RECORD_ERRORMSG);

        service
            .upload(vec![record("john@acme.com", "01-2023", 1000)])
            .await
            .unwrap();
        let status = service
            .update(record("john@acme.com", "01-2023", 2000))
            .await
            .unwrap();
        assert_eq!(status.status, UPDATED_SUCCESSFULLY);
    }

    #[tokio::test]
    async fn list_with_period_filter() {
        let stores = Stores::memory();
        let user = seed_user(&stores, "john@acme.com").await;
        let service = PayrollService::new(stores.users.clone(), stores.payroll.clone());
        service
            .upload(vec![
                record("john@acme.com", "01-2023", 1000),
                record("john@acme.com", "02-2023", 2000),
            ])
            .await
            .unwrap();

        let views = service.list(&user, Some("02-2023")).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].period, "February-2023");

        let err = service.list(&user, Some("2023-02")).await.unwrap_err();
        assert_eq!(err.to_string(), WRONG_PERIOD_PARAM_ERRORMSG);
    }
}

//! Field validation shared by signup, password change, and payroll input.
//!
//! Violations are collected and joined with `" && "` into one message.

use std::sync::OnceLock;

use regex::Regex;

use crate::security::breach::is_breached;

pub const MIN_PASSWORD_LENGTH: usize = 12;

pub const NOT_EMPTY_ERRORMSG: &str = "field is required and must not be empty";
pub const INVALID_EMAIL_ERRORMSG: &str = "Not a valid corporate Email";
pub const PASSWORD_TOO_SHORT_ERRORMSG: &str =
    "The password length must be at least 12 chars!";
pub const PASSWORD_HACKED_ERRORMSG: &str = "The password is in the hacker's database!";

pub const VIOLATION_SEPARATOR: &str = " && ";

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^(?i)\w+(\.\w+){0,2}@acme\.com$").expect("literal regex")
    })
}

fn period_regex() -> &'static Regex {
    static PERIOD_REGEX: OnceLock<Regex> = OnceLock::new();
    PERIOD_REGEX.get_or_init(|| {
        Regex::new(r"^(0[1-9]|1[0-2])-[1-9]\d{3}$").expect("literal regex")
    })
}

/// Corporate email shape: up to three dot-separated word segments at acme.com,
/// case-insensitive.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Month-first salary period, "mm-yyyy".
#[must_use]
pub fn is_valid_period(period: &str) -> bool {
    period_regex().is_match(period)
}

/// Length and breach-denylist check; `None` means the password is acceptable.
#[must_use]
pub fn validate_password(password: &str) -> Option<&'static str> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Some(PASSWORD_TOO_SHORT_ERRORMSG);
    }
    if is_breached(password) {
        return Some(PASSWORD_HACKED_ERRORMSG);
    }
    None
}

#[must_use]
pub fn join_violations(violations: &[String]) -> String {
    violations.join(VIOLATION_SEPARATOR)
}

//! Denylist of passwords known to circulate in breach dumps.
//!
//! The check is an exact, case-sensitive match. A breached password is
//! rejected everywhere it appears, even when it verifies against the stored
//! hash.

const BREACHED_PASSWORDS: [&str; 12] = [
    "PasswordForJanuary",
    "PasswordForFebruary",
    "PasswordForMarch",
    "PasswordForApril",
    "PasswordForMay",
    "PasswordForJune",
    "PasswordForJuly",
    "PasswordForAugust",
    "PasswordForSeptember",
    "PasswordForOctober",
    "PasswordForNovember",
    "PasswordForDecember",
];

#[must_use]
pub fn is_breached(password: &str) -> bool {
    BREACHED_PASSWORDS.contains(&password)
}

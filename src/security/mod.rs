//! Security core: breach checking, credential hashing, the brute-force
//! lockout machine, and the authentication gate that ties them together.

pub mod breach;
pub mod brute_force;
pub mod gate;
pub mod password;

pub use brute_force::BruteForceProtector;
pub use gate::{AuthGate, AuthenticatedUser};
pub use password::CredentialHasher;

/// Default number of consecutive failures that locks an account.
pub const DEFAULT_LOGIN_FAILED_LIMIT: i32 = 5;

/// Tunables of the security core.
#[derive(Debug, Clone, Copy)]
pub struct SecurityConfig {
    login_failed_limit: i32,
}

impl SecurityConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            login_failed_limit: DEFAULT_LOGIN_FAILED_LIMIT,
        }
    }

    #[must_use]
    pub fn with_login_failed_limit(mut self, limit: i32) -> Self {
        self.login_failed_limit = limit;
        self
    }

    #[must_use]
    pub fn login_failed_limit(&self) -> i32 {
        self.login_failed_limit
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_builder() {
        let config = SecurityConfig::new();
        assert_eq!(config.login_failed_limit(), 5);

        let config = config.with_login_failed_limit(3);
        assert_eq!(config.login_failed_limit(), 3);
    }
}

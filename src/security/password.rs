//! Credential hashing behind one small type so callers never touch the
//! algorithm directly.

use anyhow::anyhow;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Argon2id hasher with a pre-computed dummy hash.
///
/// The dummy hash lets the authentication gate spend a verification on
/// unknown identities, so a lookup miss and a password mismatch cost about
/// the same (best effort, not a constant-time guarantee).
pub struct CredentialHasher {
    dummy_hash: String,
}

impl CredentialHasher {
    /// # Errors
    /// Returns an error if hashing the dummy credential fails.
    pub fn new() -> anyhow::Result<Self> {
        let dummy_hash = hash_with_fresh_salt("konto-dummy-credential")?;
        Ok(Self { dummy_hash })
    }

    /// # Errors
    /// Returns an error if the hash cannot be computed.
    pub fn hash(&self, password: &str) -> anyhow::Result<String> {
        hash_with_fresh_salt(password)
    }

    /// `false` for mismatches and for hashes that fail to parse.
    #[must_use]
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Burn one verification against the dummy hash. Always fails.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

fn hash_with_fresh_salt(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("password hashing failed: {err}"))?;
    Ok(hash.to_string())
}

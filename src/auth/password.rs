use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Outcome of checking a signin password against an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    Match,
    Mismatch,
    /// Account created through Google; it has no local password to compare.
    NoLocalPassword,
}

/// Argon2id PHC string for a signup password.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!(error = %e, "hashing signup password failed");
            anyhow::anyhow!("hash signup password: {e}")
        })
}

/// A stored hash that does not parse is an internal error, not a mismatch.
pub fn check_password(plain: &str, stored: Option<&str>) -> anyhow::Result<PasswordCheck> {
    let Some(stored) = stored else {
        return Ok(PasswordCheck::NoLocalPassword);
    };
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is corrupt");
        anyhow::anyhow!("parse stored password hash: {e}")
    })?;
    Ok(match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => PasswordCheck::Match,
        Err(_) => PasswordCheck::Mismatch,
    })
}

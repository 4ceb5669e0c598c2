use bcrypt::{hash, verify, DEFAULT_COST};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password must be at least {0} characters long")]
    TooShort(usize),
    #[error("Password must be no more than 72 characters long")]
    TooLong,
    #[error("Failed to hash password")]
    HashingFailed,
}

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Length rules for locally created passwords. bcrypt ignores bytes past 72.
pub fn validate_password_strength(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort(MIN_PASSWORD_LENGTH));
    }
    if password.len() > 72 {
        return Err(PasswordError::TooLong);
    }
    Ok(())
}

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    validate_password_strength(password)?;
    hash(password, DEFAULT_COST).map_err(|_| PasswordError::HashingFailed)
}

/// Verify a password against a bcrypt hash. A malformed hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}

/// Check a password against the value stored in the institutional directory.
///
/// The directory holds bcrypt hashes for migrated accounts, a legacy
/// `hash_<secret>` form for older ones, and occasionally plain values. In the
/// legacy form everything after the first `hash_` is the secret, wherever
/// the marker appears.
pub fn verify_institutional_password(stored: &str, supplied: &str) -> bool {
    if stored.starts_with("$2") {
        return verify_password(supplied, stored);
    }

    let expected = stored.split_once("hash_").map_or(stored, |(_, rest)| rest);
    !expected.is_empty() && constant_time_eq(expected.as_bytes(), supplied.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

//! Password policy and hashing.
//!
//! Hashes are argon2id PHC strings, verified with the parameters embedded in
//! the hash.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::{EngineError, ResultEngine};

const MIN_LENGTH: usize = 8;

/// Collect every policy violation for `password`.
///
/// `username` and `email` are used to reject passwords that merely repeat
/// the account name.
pub fn policy_violations(password: &str, username: &str, email: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if password.chars().count() < MIN_LENGTH {
        errors.push(format!(
            "This password is too short. It must contain at least {MIN_LENGTH} characters."
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push("This password is entirely numeric.".to_string());
    }

    let lowered = password.to_lowercase();
    let local_part = email.split('@').next().unwrap_or_default().to_lowercase();
    let similar = [username.to_lowercase(), email.to_lowercase(), local_part]
        .iter()
        .any(|attr| !attr.is_empty() && *attr == lowered);
    if similar {
        errors.push("The password is too similar to the account name.".to_string());
    }
    errors
}

pub fn hash(password: &str) -> ResultEngine<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| EngineError::PasswordHash(err.to_string()))
}

/// `false` for a wrong password and for a malformed stored hash alike.
pub fn verify(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

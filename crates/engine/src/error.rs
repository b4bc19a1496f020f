//! The module contains the errors the engine can throw.
//!
//! The errors are:
//!
//! - [`KeyNotFound`] thrown when a user, token, plan or profile is missing.
//! - [`Validation`] thrown when input fails a field-level check; carries the
//!   offending fields so callers can report all of them at once.
//! - [`LockedOut`] thrown when the login throttle refuses an attempt.
//!
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`Validation`]: EngineError::Validation
//!  [`LockedOut`]: EngineError::LockedOut
use std::collections::BTreeMap;

use sea_orm::DbErr;
use thiserror::Error;

/// Field name -> list of messages, in the shape REST clients expect.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid input: {}", summarize(.0))]
    Validation(FieldErrors),
    #[error("Unable to log in with provided credentials.")]
    InvalidCredentials,
    #[error("Too many login attempts")]
    LockedOut,
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error("Mail delivery failed: {0}")]
    Mail(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Shorthand for a validation error on a single field.
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(name.to_string(), vec![message.into()]);
        Self::Validation(fields)
    }
}

fn summarize(fields: &FieldErrors) -> String {
    fields
        .iter()
        .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
        .collect::<Vec<_>>()
        .join("; ")
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::InvalidCredentials, Self::InvalidCredentials) => true,
            (Self::LockedOut, Self::LockedOut) => true,
            (Self::InvalidDuration(a), Self::InvalidDuration(b)) => a == b,
            (Self::PasswordHash(a), Self::PasswordHash(b)) => a == b,
            (Self::Mail(a), Self::Mail(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

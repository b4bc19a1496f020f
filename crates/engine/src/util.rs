//! Internal helpers for input normalization and validation.
//!
//! These utilities are **not** part of the public API. They centralize the
//! rules for account identifiers so registration, login and the admin tools
//! agree on them.

use unicode_normalization::UnicodeNormalization;

const MAX_USERNAME_LEN: usize = 150;

/// NFKC-normalise a username so visually identical names collide.
pub(crate) fn normalize_username(value: &str) -> String {
    value.nfkc().collect()
}

pub(crate) fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Letters, digits and `@.+-_`, at most 150 characters.
pub(crate) fn validate_username(username: &str) -> Option<String> {
    if username.is_empty() {
        return Some("This field may not be blank.".to_string());
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Some(format!(
            "Ensure this field has no more than {MAX_USERNAME_LEN} characters."
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Some(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        );
    }
    None
}

/// Structural check only; deliverability is proven by the confirmation mail.
pub(crate) fn validate_email(email: &str) -> Option<String> {
    let invalid = || Some("Enter a valid email address.".to_string());
    if email.is_empty() {
        return Some("This field may not be blank.".to_string());
    }
    if email.chars().any(char::is_whitespace) {
        return invalid();
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return invalid();
    };
    if local.is_empty()
        || local.contains('@')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || !domain.contains('.')
        || domain.contains('@')
    {
        return invalid();
    }
    None
}

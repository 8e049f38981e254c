//! Profile validation rules.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Minimum username length.
pub const USERNAME_MIN_LEN: usize = 2;

/// Maximum username length.
pub const USERNAME_MAX_LEN: usize = 16;

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]*[A-Za-z0-9]$").expect("regex pattern is valid")
});

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("regex pattern is valid"));

/// A field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} {message}")]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Human-readable reason.
    pub message: String,
}

impl ValidationError {
    /// Creates a validation error for a field.
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Checks username length and character rules.
///
/// Only ASCII letters, digits and hyphens are allowed, and the name may not
/// start or end with a hyphen.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::new(
            "username",
            format!("must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"),
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ValidationError::new(
            "username",
            "may only contain letters, digits and inner hyphens",
        ));
    }
    Ok(())
}

/// Checks that an email address looks deliverable.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::new("email", "can't be blank"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::new("email", "is invalid"));
    }
    Ok(())
}

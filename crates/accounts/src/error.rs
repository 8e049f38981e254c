//! Account management error types.

use account_store::StoreError;
use entities::{TokenKind, ValidationError};
use thiserror::Error;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// The email is missing, malformed or already taken.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No record matches the given key.
    #[error("{entity_type} not found: {key}")]
    NotFound {
        entity_type: &'static str,
        key: String,
    },

    /// A profile field failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A user cannot be merged into itself.
    #[error("Cannot merge a user into itself")]
    SelfMerge,

    /// The token generator kept producing values already in use.
    #[error("No unused {kind} token after {attempts} attempts")]
    TokenExhausted { kind: TokenKind, attempts: u32 },

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AccountError {
    /// Creates a not found error.
    pub fn not_found(entity_type: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            key: key.into(),
        }
    }

    /// Returns the unique column a store write collided on, if any.
    pub(crate) fn conflicting_field(&self) -> Option<&'static str> {
        match self {
            Self::Store(err) => err.conflicting_field(),
            _ => None,
        }
    }
}

/// Result type for account operations.
pub type AccountResult<T> = Result<T, AccountError>;

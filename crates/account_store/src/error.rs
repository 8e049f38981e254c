//! Account store error types.

use thiserror::Error;

/// Errors that can occur during account store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A unique column already holds the value being written.
    #[error("{entity} {field} has already been taken")]
    UniqueViolation {
        entity: &'static str,
        field: &'static str,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl StoreError {
    /// Creates a not found error.
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Creates a unique violation error.
    pub fn unique_violation(entity: &'static str, field: &'static str) -> Self {
        Self::UniqueViolation { entity, field }
    }

    /// Returns the conflicting field if this is a unique violation.
    pub fn conflicting_field(&self) -> Option<&'static str> {
        match self {
            Self::UniqueViolation { field, .. } => Some(*field),
            _ => None,
        }
    }
}

/// Result type for account store operations.
pub type StoreResult<T> = Result<T, StoreError>;

//! The identity behind a request: a stored user or an anonymous visitor.

use serde::{Deserialize, Serialize};

use crate::User;

/// Temporary username given to anonymous visitors.
pub const ANONYMOUS_USERNAME: &str = "anonymous";

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// A stored user.
    Authenticated(User),
    /// A visitor without an account.
    Anonymous { temporary_username: Option<String> },
}

impl Identity {
    /// Creates the default anonymous identity.
    pub fn anonymous() -> Self {
        Self::Anonymous {
            temporary_username: Some(ANONYMOUS_USERNAME.to_string()),
        }
    }

    /// Wraps an optional user lookup result.
    pub fn from_lookup(user: Option<User>) -> Self {
        user.map(Self::Authenticated).unwrap_or_else(Self::anonymous)
    }

    /// Returns the stored user, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Anonymous { .. } => None,
        }
    }

    /// Checks if this identity is backed by a stored user.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Returns the name to show for this identity.
    pub fn display_name(&self) -> String {
        match self {
            Self::Authenticated(user) => user.display_name(),
            Self::Anonymous { temporary_username } => temporary_username
                .clone()
                .unwrap_or_else(|| ANONYMOUS_USERNAME.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::NewUser;

    #[test]
    fn test_anonymous_identity() {
        let identity = Identity::from_lookup(None);
        assert!(!identity.is_authenticated());
        assert!(identity.user().is_none());
        assert_eq!(identity.display_name(), "anonymous");

        let unnamed = Identity::Anonymous {
            temporary_username: None,
        };
        assert_eq!(unnamed.display_name(), "anonymous");
    }

    #[test]
    fn test_authenticated_identity() {
        let user = NewUser::new("a", "f")
            .with_username("alice")
            .into_user(1, Utc::now());
        let identity = Identity::from_lookup(Some(user.clone()));

        assert!(identity.is_authenticated());
        assert_eq!(identity.user(), Some(&user));
        assert_eq!(identity.display_name(), "alice");
    }
}

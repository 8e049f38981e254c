//! User-related entity definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned user identifier.
pub type UserId = i64;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Chosen username, unique ignoring case.
    pub username: Option<String>,
    /// Name shown until the user picks a username.
    pub temporary_username: Option<String>,
    /// Email address. Present once the account is confirmed.
    pub email: Option<String>,
    /// Opaque token identifying the user's sessions.
    pub auth_token: String,
    /// Opaque token authorizing access to the user's feed.
    pub feed_token: String,
    /// Selected player theme.
    pub theme_name: Option<String>,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Sets the username, trimming surrounding whitespace.
    pub fn set_username(&mut self, value: Option<&str>) {
        self.username = value.map(|v| v.trim().to_string());
    }

    /// Sets the email, trimming surrounding whitespace.
    pub fn set_email(&mut self, value: Option<&str>) {
        self.email = value.map(|v| v.trim().to_string());
    }

    /// Sets the theme name.
    pub fn set_theme_name(&mut self, value: Option<&str>) {
        self.theme_name = value.map(str::to_string);
    }

    /// Whether the user has a confirmed email address.
    pub fn is_confirmed(&self) -> bool {
        self.email.is_some()
    }

    /// Returns the name to show for this user.
    pub fn display_name(&self) -> String {
        self.username
            .as_deref()
            .or(self.temporary_username.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("user:{}", self.id))
    }
}

/// A user that has not been stored yet.
///
/// Tokens are filled in by the account manager before insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: Option<String>,
    pub temporary_username: Option<String>,
    pub email: Option<String>,
    pub auth_token: String,
    pub feed_token: String,
    pub theme_name: Option<String>,
}

impl NewUser {
    /// Creates a new user record with the given tokens.
    pub fn new(auth_token: impl Into<String>, feed_token: impl Into<String>) -> Self {
        Self {
            username: None,
            temporary_username: None,
            email: None,
            auth_token: auth_token.into(),
            feed_token: feed_token.into(),
            theme_name: None,
        }
    }

    /// Sets the email, trimming surrounding whitespace.
    pub fn with_email(mut self, email: impl AsRef<str>) -> Self {
        self.email = Some(email.as_ref().trim().to_string());
        self
    }

    /// Sets the username, trimming surrounding whitespace.
    pub fn with_username(mut self, username: impl AsRef<str>) -> Self {
        self.username = Some(username.as_ref().trim().to_string());
        self
    }

    /// Sets the temporary username.
    pub fn with_temporary_username(mut self, name: impl Into<String>) -> Self {
        self.temporary_username = Some(name.into());
        self
    }

    /// Sets the theme name.
    pub fn with_theme_name(mut self, name: impl Into<String>) -> Self {
        self.theme_name = Some(name.into());
        self
    }

    /// Materializes the stored user with its assigned id.
    pub fn into_user(self, id: UserId, now: DateTime<Utc>) -> User {
        User {
            id,
            username: self.username,
            temporary_username: self.temporary_username,
            email: self.email,
            auth_token: self.auth_token,
            feed_token: self.feed_token,
            theme_name: self.theme_name,
            created_at: now,
            updated_at: now,
        }
    }
}

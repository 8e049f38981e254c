//! Per-user token kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The opaque tokens every user holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Session authentication token.
    Auth,
    /// Content feed token.
    Feed,
}

impl TokenKind {
    /// Returns the users column holding this token.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Auth => "auth_token",
            Self::Feed => "feed_token",
        }
    }

    /// Maps a users column name back to its token kind.
    pub fn from_column(column: &str) -> Option<Self> {
        match column {
            "auth_token" => Some(Self::Auth),
            "feed_token" => Some(Self::Feed),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Auth => write!(f, "auth"),
            TokenKind::Feed => write!(f, "feed"),
        }
    }
}

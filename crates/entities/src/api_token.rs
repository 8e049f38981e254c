//! API token entity definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Store-assigned API token identifier.
pub type ApiTokenId = i64;

/// A credential linking a recorder client installation to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiToken {
    /// Unique identifier.
    pub id: ApiTokenId,
    /// Owning user.
    pub user_id: UserId,
    /// The raw token value sent by the client.
    pub token: String,
    /// When the token was revoked, if it was.
    pub revoked_at: Option<DateTime<Utc>>,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ApiToken {
    /// Whether the token still authenticates its owner.
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_active() {
        let now = Utc::now();
        let mut token = ApiToken {
            id: 1,
            user_id: 1,
            token: "abc".to_string(),
            revoked_at: None,
            created_at: now,
            updated_at: now,
        };
        assert!(token.is_active());

        token.revoked_at = Some(now);
        assert!(!token.is_active());
    }
}

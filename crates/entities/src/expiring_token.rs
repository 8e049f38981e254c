//! Short-lived login token definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A single-use token sent to a user to sign in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringToken {
    /// Unique identifier.
    pub id: i64,
    /// Owning user.
    pub user_id: UserId,
    /// Token value.
    pub token: String,
    /// Instant after which the token is rejected.
    pub expires_at: DateTime<Utc>,
    /// When the token was redeemed.
    pub used_at: Option<DateTime<Utc>>,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
}

impl ExpiringToken {
    /// Whether the token can still be redeemed at `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_is_usable() {
        let now = Utc::now();
        let mut token = ExpiringToken {
            id: 1,
            user_id: 1,
            token: "t".to_string(),
            expires_at: now + Duration::minutes(15),
            used_at: None,
            created_at: now,
        };
        assert!(token.is_usable(now));
        assert!(!token.is_usable(now + Duration::minutes(16)));

        token.used_at = Some(now);
        assert!(!token.is_usable(now));
    }
}

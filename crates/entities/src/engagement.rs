//! Likes and comments left by users on asciicasts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AsciicastId, UserId};

/// A user's like of an asciicast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub id: i64,
    pub user_id: UserId,
    pub asciicast_id: AsciicastId,
    pub created_at: DateTime<Utc>,
}

/// A user's comment on an asciicast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub user_id: UserId,
    pub asciicast_id: AsciicastId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

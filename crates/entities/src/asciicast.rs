//! Asciicast entity definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Store-assigned asciicast identifier.
pub type AsciicastId = i64;

/// A recorded terminal session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asciicast {
    /// Unique identifier.
    pub id: AsciicastId,
    /// Owning user.
    pub user_id: UserId,
    /// Optional title.
    pub title: Option<String>,
    /// Hidden from listings of other visitors.
    pub private: bool,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

/// An asciicast that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsciicast {
    pub user_id: UserId,
    pub title: Option<String>,
    pub private: bool,
}

impl NewAsciicast {
    /// Creates a public asciicast for a user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            title: None,
            private: false,
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Marks the asciicast private.
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }
}

/// A page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    /// Maximum number of items per page.
    pub per_page: u32,
    /// Total number of items across all pages.
    pub total: u64,
}

impl<T> Page<T> {
    /// Number of pages needed to show every item.
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.per_page))
    }

    /// Whether a page follows this one.
    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}

//! Account store trait definitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entities::{
    ApiToken, ApiTokenId, Asciicast, AsciicastId, Comment, ExpiringToken, Like, NewAsciicast,
    NewUser, TokenKind, User, UserId,
};

use crate::StoreResult;

/// Filter options for listing a user's asciicasts.
#[derive(Debug, Clone, Default)]
pub struct AsciicastFilter {
    /// Include asciicasts marked private.
    pub include_private: bool,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

impl AsciicastFilter {
    /// Creates a filter matching public asciicasts only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Includes private asciicasts.
    pub fn with_private(mut self, include_private: bool) -> Self {
        self.include_private = include_private;
        self
    }

    /// Limits the result to one page.
    pub fn with_page(mut self, offset: u32, limit: u32) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    pub(crate) fn matches(&self, asciicast: &Asciicast) -> bool {
        self.include_private || !asciicast.private
    }
}

/// Trait for user account storage operations.
///
/// Every method is atomic on its own. Writes that collide with a unique
/// column fail with [`StoreError::UniqueViolation`](crate::StoreError)
/// naming that column.
#[async_trait]
pub trait AccountStore: Send + Sync {
    // =========================================================================
    // User operations
    // =========================================================================

    /// Inserts a new user.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    /// Gets a user by ID.
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Gets a user by exact email.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Gets a user by exact username.
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Gets a user whose username equals `username` ignoring case.
    async fn find_user_by_username_ignore_case(&self, username: &str)
        -> StoreResult<Option<User>>;

    /// Gets a user by auth token.
    async fn find_user_by_auth_token(&self, token: &str) -> StoreResult<Option<User>>;

    /// Gets the owner of an active (not revoked) API token.
    async fn find_user_by_api_token(&self, token: &str) -> StoreResult<Option<User>>;

    /// Checks whether any user holds `value` as its token of `kind`.
    async fn token_in_use(&self, kind: TokenKind, value: &str) -> StoreResult<bool>;

    /// Updates the mutable profile fields of a user.
    async fn update_user(&self, user: &User) -> StoreResult<User>;

    /// Deletes a user together with every record it owns.
    async fn delete_user(&self, id: UserId) -> StoreResult<()>;

    /// Moves the asciicasts and API tokens of `source` to `target`, then
    /// deletes `source` with its remaining records, in one transaction.
    async fn merge_users(&self, source: UserId, target: UserId) -> StoreResult<()>;

    // =========================================================================
    // API token operations
    // =========================================================================

    /// Gets an API token record by its raw value, revoked or not.
    async fn find_api_token(&self, token: &str) -> StoreResult<Option<ApiToken>>;

    /// Creates an API token owned by a user.
    async fn create_api_token(&self, user_id: UserId, token: &str) -> StoreResult<ApiToken>;

    /// Transfers an API token to another user.
    async fn reassign_api_token(&self, id: ApiTokenId, user_id: UserId)
        -> StoreResult<ApiToken>;

    /// Marks an API token revoked.
    async fn revoke_api_token(&self, id: ApiTokenId) -> StoreResult<ApiToken>;

    /// Lists the API tokens owned by a user.
    async fn list_api_tokens(&self, user_id: UserId) -> StoreResult<Vec<ApiToken>>;

    // =========================================================================
    // Asciicast operations
    // =========================================================================

    /// Creates an asciicast.
    async fn create_asciicast(&self, asciicast: NewAsciicast) -> StoreResult<Asciicast>;

    /// Gets an asciicast by ID.
    async fn get_asciicast(&self, id: AsciicastId) -> StoreResult<Option<Asciicast>>;

    /// Counts a user's asciicasts.
    async fn count_asciicasts(&self, user_id: UserId, include_private: bool) -> StoreResult<u64>;

    /// Lists a user's asciicasts, newest first.
    async fn list_asciicasts(
        &self,
        user_id: UserId,
        filter: AsciicastFilter,
    ) -> StoreResult<Vec<Asciicast>>;

    /// Returns up to `limit` random public asciicasts of a user, skipping
    /// `exclude`.
    async fn sample_public_asciicasts(
        &self,
        user_id: UserId,
        exclude: AsciicastId,
        limit: u32,
    ) -> StoreResult<Vec<Asciicast>>;

    // =========================================================================
    // Likes, comments and expiring tokens
    // =========================================================================

    /// Records a like.
    async fn create_like(&self, user_id: UserId, asciicast_id: AsciicastId) -> StoreResult<Like>;

    /// Records a comment.
    async fn create_comment(
        &self,
        user_id: UserId,
        asciicast_id: AsciicastId,
        body: &str,
    ) -> StoreResult<Comment>;

    /// Counts the likes left by a user.
    async fn count_likes(&self, user_id: UserId) -> StoreResult<u64>;

    /// Counts the comments left by a user.
    async fn count_comments(&self, user_id: UserId) -> StoreResult<u64>;

    /// Stores an expiring token for a user.
    async fn create_expiring_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<ExpiringToken>;

    /// Counts every expiring token ever issued to a user.
    async fn count_expiring_tokens(&self, user_id: UserId) -> StoreResult<u64>;
}

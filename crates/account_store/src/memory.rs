//! In-memory account store implementation for testing.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entities::{
    ApiToken, ApiTokenId, Asciicast, AsciicastId, Comment, ExpiringToken, Like, NewAsciicast,
    NewUser, TokenKind, User, UserId,
};
use rand::seq::SliceRandom;
use tokio::sync::RwLock;

use crate::{AccountStore, AsciicastFilter, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<UserId, User>,
    api_tokens: BTreeMap<ApiTokenId, ApiToken>,
    asciicasts: BTreeMap<AsciicastId, Asciicast>,
    likes: BTreeMap<i64, Like>,
    comments: BTreeMap<i64, Comment>,
    expiring_tokens: BTreeMap<i64, ExpiringToken>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Finds the first unique users column that `candidate` would collide on.
    fn user_conflict(
        &self,
        id: Option<UserId>,
        username: Option<&str>,
        email: Option<&str>,
        auth_token: &str,
        feed_token: &str,
    ) -> Option<&'static str> {
        let others = || self.users.values().filter(move |u| Some(u.id) != id);

        if let Some(email) = email {
            if others().any(|u| u.email.as_deref() == Some(email)) {
                return Some("email");
            }
        }
        if let Some(username) = username {
            let lowered = username.to_lowercase();
            if others().any(|u| {
                u.username
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase() == lowered)
            }) {
                return Some("username");
            }
        }
        if others().any(|u| u.auth_token == auth_token) {
            return Some("auth_token");
        }
        if others().any(|u| u.feed_token == feed_token) {
            return Some("feed_token");
        }
        None
    }

    fn remove_user_records(&mut self, id: UserId) {
        let owned_casts: Vec<AsciicastId> = self
            .asciicasts
            .values()
            .filter(|a| a.user_id == id)
            .map(|a| a.id)
            .collect();

        self.api_tokens.retain(|_, t| t.user_id != id);
        self.asciicasts.retain(|_, a| a.user_id != id);
        self.likes
            .retain(|_, l| l.user_id != id && !owned_casts.contains(&l.asciicast_id));
        self.comments
            .retain(|_, c| c.user_id != id && !owned_casts.contains(&c.asciicast_id));
        self.expiring_tokens.retain(|_, t| t.user_id != id);
        self.users.remove(&id);
    }
}

/// In-memory account store for testing purposes.
///
/// All tables live behind a single lock, so every operation (merges
/// included) is observed either completely or not at all.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    tables: RwLock<Tables>,
}

impl MemoryAccountStore {
    /// Creates a new in-memory account store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    // =========================================================================
    // User operations
    // =========================================================================

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if let Some(field) = tables.user_conflict(
            None,
            user.username.as_deref(),
            user.email.as_deref(),
            &user.auth_token,
            &user.feed_token,
        ) {
            return Err(StoreError::unique_violation("User", field));
        }
        let id = tables.allocate_id();
        let user = user.into_user(id, Utc::now());
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username.as_deref() == Some(username))
            .cloned())
    }

    async fn find_user_by_username_ignore_case(
        &self,
        username: &str,
    ) -> StoreResult<Option<User>> {
        let lowered = username.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| {
                u.username
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase() == lowered)
            })
            .cloned())
    }

    async fn find_user_by_auth_token(&self, token: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.auth_token == token)
            .cloned())
    }

    async fn find_user_by_api_token(&self, token: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .api_tokens
            .values()
            .find(|t| t.token == token && t.is_active())
            .and_then(|t| tables.users.get(&t.user_id))
            .cloned())
    }

    async fn token_in_use(&self, kind: TokenKind, value: &str) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().any(|u| match kind {
            TokenKind::Auth => u.auth_token == value,
            TokenKind::Feed => u.feed_token == value,
        }))
    }

    async fn update_user(&self, user: &User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.users.get(&user.id) else {
            return Err(StoreError::not_found("User", user.id));
        };

        // Tokens and creation time are fixed at insert
        let updated = User {
            username: user.username.clone(),
            temporary_username: user.temporary_username.clone(),
            email: user.email.clone(),
            theme_name: user.theme_name.clone(),
            updated_at: Utc::now(),
            ..stored.clone()
        };
        if let Some(field) = tables.user_conflict(
            Some(user.id),
            updated.username.as_deref(),
            updated.email.as_deref(),
            &updated.auth_token,
            &updated.feed_token,
        ) {
            return Err(StoreError::unique_violation("User", field));
        }
        tables.users.insert(user.id, updated.clone());
        Ok(updated)
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) {
            return Err(StoreError::not_found("User", id));
        }
        tables.remove_user_records(id);
        Ok(())
    }

    async fn merge_users(&self, source: UserId, target: UserId) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        for id in [source, target] {
            if !tables.users.contains_key(&id) {
                return Err(StoreError::not_found("User", id));
            }
        }

        let now = Utc::now();
        for asciicast in tables.asciicasts.values_mut() {
            if asciicast.user_id == source {
                asciicast.user_id = target;
                asciicast.updated_at = now;
            }
        }
        for token in tables.api_tokens.values_mut() {
            if token.user_id == source {
                token.user_id = target;
                token.updated_at = now;
            }
        }
        tables.remove_user_records(source);
        Ok(())
    }

    // =========================================================================
    // API token operations
    // =========================================================================

    async fn find_api_token(&self, token: &str) -> StoreResult<Option<ApiToken>> {
        let tables = self.tables.read().await;
        Ok(tables
            .api_tokens
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn create_api_token(&self, user_id: UserId, token: &str) -> StoreResult<ApiToken> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::not_found("User", user_id));
        }
        if tables.api_tokens.values().any(|t| t.token == token) {
            return Err(StoreError::unique_violation("ApiToken", "token"));
        }
        let now = Utc::now();
        let api_token = ApiToken {
            id: tables.allocate_id(),
            user_id,
            token: token.to_string(),
            revoked_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.api_tokens.insert(api_token.id, api_token.clone());
        Ok(api_token)
    }

    async fn reassign_api_token(
        &self,
        id: ApiTokenId,
        user_id: UserId,
    ) -> StoreResult<ApiToken> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::not_found("User", user_id));
        }
        let token = tables
            .api_tokens
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("ApiToken", id))?;
        token.user_id = user_id;
        token.updated_at = Utc::now();
        Ok(token.clone())
    }

    async fn revoke_api_token(&self, id: ApiTokenId) -> StoreResult<ApiToken> {
        let mut tables = self.tables.write().await;
        let token = tables
            .api_tokens
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("ApiToken", id))?;
        let now = Utc::now();
        token.revoked_at = Some(now);
        token.updated_at = now;
        Ok(token.clone())
    }

    async fn list_api_tokens(&self, user_id: UserId) -> StoreResult<Vec<ApiToken>> {
        let tables = self.tables.read().await;
        Ok(tables
            .api_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    // =========================================================================
    // Asciicast operations
    // =========================================================================

    async fn create_asciicast(&self, asciicast: NewAsciicast) -> StoreResult<Asciicast> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&asciicast.user_id) {
            return Err(StoreError::not_found("User", asciicast.user_id));
        }
        let now = Utc::now();
        let asciicast = Asciicast {
            id: tables.allocate_id(),
            user_id: asciicast.user_id,
            title: asciicast.title,
            private: asciicast.private,
            created_at: now,
            updated_at: now,
        };
        tables.asciicasts.insert(asciicast.id, asciicast.clone());
        Ok(asciicast)
    }

    async fn get_asciicast(&self, id: AsciicastId) -> StoreResult<Option<Asciicast>> {
        let tables = self.tables.read().await;
        Ok(tables.asciicasts.get(&id).cloned())
    }

    async fn count_asciicasts(&self, user_id: UserId, include_private: bool) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .asciicasts
            .values()
            .filter(|a| a.user_id == user_id && (include_private || !a.private))
            .count() as u64)
    }

    async fn list_asciicasts(
        &self,
        user_id: UserId,
        filter: AsciicastFilter,
    ) -> StoreResult<Vec<Asciicast>> {
        let tables = self.tables.read().await;
        let mut result: Vec<Asciicast> = tables
            .asciicasts
            .values()
            .filter(|a| a.user_id == user_id && filter.matches(a))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        if let Some(offset) = filter.offset {
            result = result.into_iter().skip(offset as usize).collect();
        }
        if let Some(limit) = filter.limit {
            result.truncate(limit as usize);
        }

        Ok(result)
    }

    async fn sample_public_asciicasts(
        &self,
        user_id: UserId,
        exclude: AsciicastId,
        limit: u32,
    ) -> StoreResult<Vec<Asciicast>> {
        let tables = self.tables.read().await;
        let mut result: Vec<Asciicast> = tables
            .asciicasts
            .values()
            .filter(|a| a.user_id == user_id && !a.private && a.id != exclude)
            .cloned()
            .collect();
        result.shuffle(&mut rand::rng());
        result.truncate(limit as usize);
        Ok(result)
    }

    // =========================================================================
    // Likes, comments and expiring tokens
    // =========================================================================

    async fn create_like(&self, user_id: UserId, asciicast_id: AsciicastId) -> StoreResult<Like> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::not_found("User", user_id));
        }
        if !tables.asciicasts.contains_key(&asciicast_id) {
            return Err(StoreError::not_found("Asciicast", asciicast_id));
        }
        let like = Like {
            id: tables.allocate_id(),
            user_id,
            asciicast_id,
            created_at: Utc::now(),
        };
        tables.likes.insert(like.id, like.clone());
        Ok(like)
    }

    async fn create_comment(
        &self,
        user_id: UserId,
        asciicast_id: AsciicastId,
        body: &str,
    ) -> StoreResult<Comment> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::not_found("User", user_id));
        }
        if !tables.asciicasts.contains_key(&asciicast_id) {
            return Err(StoreError::not_found("Asciicast", asciicast_id));
        }
        let comment = Comment {
            id: tables.allocate_id(),
            user_id,
            asciicast_id,
            body: body.to_string(),
            created_at: Utc::now(),
        };
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn count_likes(&self, user_id: UserId) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables.likes.values().filter(|l| l.user_id == user_id).count() as u64)
    }

    async fn count_comments(&self, user_id: UserId) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .values()
            .filter(|c| c.user_id == user_id)
            .count() as u64)
    }

    async fn create_expiring_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<ExpiringToken> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::not_found("User", user_id));
        }
        if tables.expiring_tokens.values().any(|t| t.token == token) {
            return Err(StoreError::unique_violation("ExpiringToken", "token"));
        }
        let expiring = ExpiringToken {
            id: tables.allocate_id(),
            user_id,
            token: token.to_string(),
            expires_at,
            used_at: None,
            created_at: Utc::now(),
        };
        tables.expiring_tokens.insert(expiring.id, expiring.clone());
        Ok(expiring)
    }

    async fn count_expiring_tokens(&self, user_id: UserId) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .expiring_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .count() as u64)
    }
}

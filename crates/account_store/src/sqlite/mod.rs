//! SQLite account store built on `sqlx`.

mod migrations;
mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entities::{
    ApiToken, ApiTokenId, Asciicast, AsciicastId, Comment, ExpiringToken, Like, NewAsciicast,
    NewUser, TokenKind, User, UserId,
};
pub use migrations::{TokenSource, LATEST_VERSION};
use schema::{
    to_db_time, unique_field, ApiTokenRow, AsciicastRow, CommentRow, ExpiringTokenRow, LikeRow,
    UserRow, API_TOKEN_COLUMNS, ASCIICAST_COLUMNS, USER_COLUMNS,
};
use sqlx::{sqlite::SqlitePoolOptions, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::{AccountStore, AsciicastFilter, StoreError, StoreResult};

/// Account store backed by a SQLite connection pool.
#[derive(Clone)]
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    /// Connects to a SQLite database URL, e.g. `sqlite:accounts.db?mode=rwc`.
    ///
    /// In-memory databases are private to their connection, so they get a
    /// single connection that is never recycled.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = options.connect(url).await?;
        info!(url, "Connected to account database");
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs every pending schema migration.
    ///
    /// `generate_token` supplies the values used to backfill feed tokens on
    /// existing rows.
    pub async fn migrate(&self, generate_token: TokenSource<'_>) -> StoreResult<()> {
        migrations::migrate_to(&self.pool, LATEST_VERSION, generate_token).await
    }

    /// Returns the schema version recorded in the database.
    pub async fn schema_version(&self) -> StoreResult<i64> {
        migrations::schema_version(&self.pool).await
    }

    async fn fetch_user_where(&self, clause: &str, value: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}"))
                .bind(value)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(User::from))
    }

    async fn ensure_user_exists(&self, id: UserId) -> StoreResult<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if count == 0 {
            return Err(StoreError::not_found("User", id));
        }
        Ok(())
    }

    async fn ensure_asciicast_exists(&self, id: AsciicastId) -> StoreResult<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM asciicasts WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if count == 0 {
            return Err(StoreError::not_found("Asciicast", id));
        }
        Ok(())
    }

    async fn fetch_api_token(&self, id: ApiTokenId) -> StoreResult<ApiToken> {
        let row: Option<ApiTokenRow> =
            sqlx::query_as(&format!("SELECT {API_TOKEN_COLUMNS} FROM api_tokens WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(ApiToken::from)
            .ok_or_else(|| StoreError::not_found("ApiToken", id))
    }
}

/// Converts unique-constraint failures into [`StoreError::UniqueViolation`].
fn map_unique(entity: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                if let Some(field) = unique_field(db_err.message()) {
                    return StoreError::unique_violation(entity, field);
                }
            }
        }
        StoreError::Database(err)
    }
}

/// Deletes a user and everything it owns on an open connection.
///
/// Returns the number of deleted user rows.
async fn delete_user_records(conn: &mut SqliteConnection, id: UserId) -> StoreResult<u64> {
    for statement in [
        "DELETE FROM likes WHERE user_id = ?1 \
         OR asciicast_id IN (SELECT id FROM asciicasts WHERE user_id = ?1)",
        "DELETE FROM comments WHERE user_id = ?1 \
         OR asciicast_id IN (SELECT id FROM asciicasts WHERE user_id = ?1)",
        "DELETE FROM api_tokens WHERE user_id = ?1",
        "DELETE FROM asciicasts WHERE user_id = ?1",
        "DELETE FROM expiring_tokens WHERE user_id = ?1",
    ] {
        sqlx::query(statement).bind(id).execute(&mut *conn).await?;
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    // =========================================================================
    // User operations
    // =========================================================================

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let now = to_db_time(&Utc::now());

        let result = sqlx::query(
            "INSERT INTO users (username, temporary_username, email, auth_token, feed_token,
                                theme_name, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.temporary_username)
        .bind(&user.email)
        .bind(&user.auth_token)
        .bind(&user.feed_token)
        .bind(&user.theme_name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(map_unique("User"))?;

        let id = result.last_insert_rowid();
        debug!(user_id = id, "Inserted user");

        self.get_user(id)
            .await?
            .ok_or_else(|| StoreError::not_found("User", id))
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.fetch_user_where("email = ?", email).await
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.fetch_user_where("username = ?", username).await
    }

    async fn find_user_by_username_ignore_case(
        &self,
        username: &str,
    ) -> StoreResult<Option<User>> {
        self.fetch_user_where("lower(username) = lower(?)", username)
            .await
    }

    async fn find_user_by_auth_token(&self, token: &str) -> StoreResult<Option<User>> {
        self.fetch_user_where("auth_token = ?", token).await
    }

    async fn find_user_by_api_token(&self, token: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT u.id, u.username, u.temporary_username, u.email, u.auth_token,
                    u.feed_token, u.theme_name, u.created_at, u.updated_at
             FROM users u
             JOIN api_tokens t ON t.user_id = u.id
             WHERE t.token = ? AND t.revoked_at IS NULL",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn token_in_use(&self, kind: TokenKind, value: &str) -> StoreResult<bool> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM users WHERE {} = ?",
            kind.column()
        ))
        .bind(value)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn update_user(&self, user: &User) -> StoreResult<User> {
        let now = to_db_time(&Utc::now());

        let result = sqlx::query(
            "UPDATE users SET username = ?, temporary_username = ?, email = ?, theme_name = ?,
                              updated_at = ?
             WHERE id = ?",
        )
        .bind(&user.username)
        .bind(&user.temporary_username)
        .bind(&user.email)
        .bind(&user.theme_name)
        .bind(&now)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(map_unique("User"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("User", user.id));
        }

        self.get_user(user.id)
            .await?
            .ok_or_else(|| StoreError::not_found("User", user.id))
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        if delete_user_records(&mut *tx, id).await? == 0 {
            return Err(StoreError::not_found("User", id));
        }

        tx.commit().await?;
        info!(user_id = id, "Deleted user");
        Ok(())
    }

    async fn merge_users(&self, source: UserId, target: UserId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let target_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(target)
            .fetch_one(&mut *tx)
            .await?;
        if target_exists == 0 {
            return Err(StoreError::not_found("User", target));
        }

        let now = to_db_time(&Utc::now());
        let moved_casts = sqlx::query(
            "UPDATE asciicasts SET user_id = ?, updated_at = ? WHERE user_id = ?",
        )
        .bind(target)
        .bind(&now)
        .bind(source)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let moved_tokens = sqlx::query(
            "UPDATE api_tokens SET user_id = ?, updated_at = ? WHERE user_id = ?",
        )
        .bind(target)
        .bind(&now)
        .bind(source)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if delete_user_records(&mut *tx, source).await? == 0 {
            return Err(StoreError::not_found("User", source));
        }

        tx.commit().await?;
        info!(
            source,
            target, moved_casts, moved_tokens, "Merged user accounts"
        );
        Ok(())
    }

    // =========================================================================
    // API token operations
    // =========================================================================

    async fn find_api_token(&self, token: &str) -> StoreResult<Option<ApiToken>> {
        let row: Option<ApiTokenRow> = sqlx::query_as(&format!(
            "SELECT {API_TOKEN_COLUMNS} FROM api_tokens WHERE token = ?"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ApiToken::from))
    }

    async fn create_api_token(&self, user_id: UserId, token: &str) -> StoreResult<ApiToken> {
        self.ensure_user_exists(user_id).await?;
        let now = to_db_time(&Utc::now());

        let result = sqlx::query(
            "INSERT INTO api_tokens (user_id, token, created_at, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(token)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(map_unique("ApiToken"))?;

        self.fetch_api_token(result.last_insert_rowid()).await
    }

    async fn reassign_api_token(
        &self,
        id: ApiTokenId,
        user_id: UserId,
    ) -> StoreResult<ApiToken> {
        self.ensure_user_exists(user_id).await?;
        let now = to_db_time(&Utc::now());

        let result = sqlx::query("UPDATE api_tokens SET user_id = ?, updated_at = ? WHERE id = ?")
            .bind(user_id)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("ApiToken", id));
        }

        self.fetch_api_token(id).await
    }

    async fn revoke_api_token(&self, id: ApiTokenId) -> StoreResult<ApiToken> {
        let now = to_db_time(&Utc::now());

        let result =
            sqlx::query("UPDATE api_tokens SET revoked_at = ?, updated_at = ? WHERE id = ?")
                .bind(&now)
                .bind(&now)
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("ApiToken", id));
        }

        self.fetch_api_token(id).await
    }

    async fn list_api_tokens(&self, user_id: UserId) -> StoreResult<Vec<ApiToken>> {
        let rows: Vec<ApiTokenRow> = sqlx::query_as(&format!(
            "SELECT {API_TOKEN_COLUMNS} FROM api_tokens WHERE user_id = ? ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ApiToken::from).collect())
    }

    // =========================================================================
    // Asciicast operations
    // =========================================================================

    async fn create_asciicast(&self, asciicast: NewAsciicast) -> StoreResult<Asciicast> {
        self.ensure_user_exists(asciicast.user_id).await?;
        let now = to_db_time(&Utc::now());

        let result = sqlx::query(
            "INSERT INTO asciicasts (user_id, title, private, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(asciicast.user_id)
        .bind(&asciicast.title)
        .bind(asciicast.private)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_asciicast(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Asciicast", id))
    }

    async fn get_asciicast(&self, id: AsciicastId) -> StoreResult<Option<Asciicast>> {
        let row: Option<AsciicastRow> = sqlx::query_as(&format!(
            "SELECT {ASCIICAST_COLUMNS} FROM asciicasts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Asciicast::from))
    }

    async fn count_asciicasts(&self, user_id: UserId, include_private: bool) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM asciicasts WHERE user_id = ? AND (? OR private = 0)",
        )
        .bind(user_id)
        .bind(include_private)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn list_asciicasts(
        &self,
        user_id: UserId,
        filter: AsciicastFilter,
    ) -> StoreResult<Vec<Asciicast>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = filter.limit.map(i64::from).unwrap_or(-1);
        let offset = filter.offset.map(i64::from).unwrap_or(0);

        let rows: Vec<AsciicastRow> = sqlx::query_as(&format!(
            "SELECT {ASCIICAST_COLUMNS} FROM asciicasts
             WHERE user_id = ? AND (? OR private = 0)
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(filter.include_private)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Asciicast::from).collect())
    }

    async fn sample_public_asciicasts(
        &self,
        user_id: UserId,
        exclude: AsciicastId,
        limit: u32,
    ) -> StoreResult<Vec<Asciicast>> {
        let rows: Vec<AsciicastRow> = sqlx::query_as(&format!(
            "SELECT {ASCIICAST_COLUMNS} FROM asciicasts
             WHERE user_id = ? AND private = 0 AND id != ?
             ORDER BY RANDOM()
             LIMIT ?"
        ))
        .bind(user_id)
        .bind(exclude)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Asciicast::from).collect())
    }

    // =========================================================================
    // Likes, comments and expiring tokens
    // =========================================================================

    async fn create_like(&self, user_id: UserId, asciicast_id: AsciicastId) -> StoreResult<Like> {
        self.ensure_user_exists(user_id).await?;
        self.ensure_asciicast_exists(asciicast_id).await?;
        let now = to_db_time(&Utc::now());

        let row: LikeRow = sqlx::query_as(
            "INSERT INTO likes (user_id, asciicast_id, created_at) VALUES (?, ?, ?)
             RETURNING id, user_id, asciicast_id, created_at",
        )
        .bind(user_id)
        .bind(asciicast_id)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn create_comment(
        &self,
        user_id: UserId,
        asciicast_id: AsciicastId,
        body: &str,
    ) -> StoreResult<Comment> {
        self.ensure_user_exists(user_id).await?;
        self.ensure_asciicast_exists(asciicast_id).await?;
        let now = to_db_time(&Utc::now());

        let row: CommentRow = sqlx::query_as(
            "INSERT INTO comments (user_id, asciicast_id, body, created_at) VALUES (?, ?, ?, ?)
             RETURNING id, user_id, asciicast_id, body, created_at",
        )
        .bind(user_id)
        .bind(asciicast_id)
        .bind(body)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn count_likes(&self, user_id: UserId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_comments(&self, user_id: UserId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn create_expiring_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<ExpiringToken> {
        self.ensure_user_exists(user_id).await?;
        let now = to_db_time(&Utc::now());

        let row: ExpiringTokenRow = sqlx::query_as(
            "INSERT INTO expiring_tokens (user_id, token, expires_at, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, user_id, token, expires_at, used_at, created_at",
        )
        .bind(user_id)
        .bind(token)
        .bind(to_db_time(&expires_at))
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique("ExpiringToken"))?;

        Ok(row.into())
    }

    async fn count_expiring_tokens(&self, user_id: UserId) -> StoreResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM expiring_tokens WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    async fn store() -> SqliteAccountStore {
        let store = SqliteAccountStore::connect("sqlite::memory:").await.unwrap();
        let counter = AtomicUsize::new(0);
        let source = move || format!("backfill-{}", counter.fetch_add(1, Ordering::SeqCst));
        store.migrate(&source).await.unwrap();
        store
    }

    async fn user(store: &SqliteAccountStore, n: u32) -> User {
        store
            .create_user(NewUser::new(format!("auth-{n}"), format!("feed-{n}")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_store_users() {
        let store = store().await;
        assert_eq!(store.schema_version().await.unwrap(), LATEST_VERSION);

        let created = store
            .create_user(
                NewUser::new("a1", "f1")
                    .with_email("alice@example.com")
                    .with_username("Alice"),
            )
            .await
            .unwrap();
        assert_eq!(created.email.as_deref(), Some("alice@example.com"));

        let by_name = store.find_user_by_username("Alice").await.unwrap();
        assert_eq!(by_name.map(|u| u.id), Some(created.id));
        assert!(store.find_user_by_username("alice").await.unwrap().is_none());

        let folded = store
            .find_user_by_username_ignore_case("ALICE")
            .await
            .unwrap();
        assert_eq!(folded.map(|u| u.id), Some(created.id));

        assert!(store.token_in_use(TokenKind::Auth, "a1").await.unwrap());
        assert!(!store.token_in_use(TokenKind::Feed, "a1").await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_store_unique_columns() {
        let store = store().await;
        store
            .create_user(
                NewUser::new("a1", "f1")
                    .with_email("a@example.com")
                    .with_username("Bob"),
            )
            .await
            .unwrap();

        let err = store
            .create_user(NewUser::new("a2", "f2").with_email("a@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.conflicting_field(), Some("email"));

        let err = store
            .create_user(NewUser::new("a2", "f2").with_username("bob"))
            .await
            .unwrap_err();
        assert_eq!(err.conflicting_field(), Some("username"));

        let err = store.create_user(NewUser::new("a1", "f2")).await.unwrap_err();
        assert_eq!(err.conflicting_field(), Some("auth_token"));

        let err = store.create_user(NewUser::new("a2", "f1")).await.unwrap_err();
        assert_eq!(err.conflicting_field(), Some("feed_token"));

        store.create_user(NewUser::new("a3", "f3")).await.unwrap();
        store.create_user(NewUser::new("a4", "f4")).await.unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_store_update_user() {
        let store = store().await;
        let mut alice = user(&store, 1).await;
        let bob = store
            .create_user(NewUser::new("a2", "f2").with_email("bob@example.com"))
            .await
            .unwrap();

        alice.set_username(Some("alice"));
        alice.set_theme_name(Some("tango"));
        let updated = store.update_user(&alice).await.unwrap();
        assert_eq!(updated.username.as_deref(), Some("alice"));
        assert_eq!(updated.theme_name.as_deref(), Some("tango"));

        alice.set_email(Some("bob@example.com"));
        let err = store.update_user(&alice).await.unwrap_err();
        assert_eq!(err.conflicting_field(), Some("email"));

        let mut ghost = bob.clone();
        ghost.id = 999;
        let err = store.update_user(&ghost).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_sqlite_store_api_tokens() {
        let store = store().await;
        let alice = user(&store, 1).await;
        let bob = user(&store, 2).await;

        let token = store.create_api_token(alice.id, "install-1").await.unwrap();
        assert!(token.is_active());

        let moved = store.reassign_api_token(token.id, bob.id).await.unwrap();
        assert_eq!(moved.user_id, bob.id);
        let owner = store.find_user_by_api_token("install-1").await.unwrap();
        assert_eq!(owner.map(|u| u.id), Some(bob.id));

        let revoked = store.revoke_api_token(token.id).await.unwrap();
        assert!(!revoked.is_active());
        assert!(store
            .find_user_by_api_token("install-1")
            .await
            .unwrap()
            .is_none());

        let err = store
            .create_api_token(alice.id, "install-1")
            .await
            .unwrap_err();
        assert_eq!(err.conflicting_field(), Some("token"));

        let err = store.create_api_token(999, "install-2").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_sqlite_store_merge() {
        let store = store().await;
        let source = user(&store, 1).await;
        let target = user(&store, 2).await;

        store.create_asciicast(NewAsciicast::new(source.id)).await.unwrap();
        store
            .create_asciicast(NewAsciicast::new(source.id).private())
            .await
            .unwrap();
        store.create_api_token(source.id, "install-1").await.unwrap();

        store.merge_users(source.id, target.id).await.unwrap();

        assert!(store.get_user(source.id).await.unwrap().is_none());
        assert_eq!(store.count_asciicasts(target.id, true).await.unwrap(), 2);
        let tokens = store.list_api_tokens(target.id).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token, "install-1");
    }

    #[tokio::test]
    async fn test_sqlite_store_merge_rolls_back_on_failure() {
        let store = store().await;
        let source = user(&store, 1).await;
        let target = user(&store, 2).await;

        store.create_asciicast(NewAsciicast::new(source.id)).await.unwrap();
        store.create_asciicast(NewAsciicast::new(source.id)).await.unwrap();
        store.create_api_token(source.id, "install-1").await.unwrap();

        // Fails the final step, after the reassignment updates have run.
        sqlx::raw_sql(
            "CREATE TRIGGER block_user_delete BEFORE DELETE ON users
             BEGIN SELECT RAISE(ABORT, 'user deletion blocked'); END;",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let err = store.merge_users(source.id, target.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));

        assert!(store.get_user(source.id).await.unwrap().is_some());
        assert_eq!(store.count_asciicasts(source.id, true).await.unwrap(), 2);
        assert_eq!(store.count_asciicasts(target.id, true).await.unwrap(), 0);
        assert!(store.list_api_tokens(target.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_store_delete_cascades() {
        let store = store().await;
        let alice = user(&store, 1).await;
        let bob = user(&store, 2).await;

        let cast = store.create_asciicast(NewAsciicast::new(alice.id)).await.unwrap();
        let bobs_cast = store.create_asciicast(NewAsciicast::new(bob.id)).await.unwrap();
        store.create_like(bob.id, cast.id).await.unwrap();
        store.create_comment(alice.id, bobs_cast.id, "nice").await.unwrap();
        store
            .create_expiring_token(alice.id, "login-1", Utc::now())
            .await
            .unwrap();

        store.delete_user(alice.id).await.unwrap();

        assert!(store.get_asciicast(cast.id).await.unwrap().is_none());
        assert_eq!(store.count_likes(bob.id).await.unwrap(), 0);
        assert_eq!(store.count_comments(alice.id).await.unwrap(), 0);
        assert_eq!(store.count_expiring_tokens(alice.id).await.unwrap(), 0);
        assert!(store.get_asciicast(bobs_cast.id).await.unwrap().is_some());

        let err = store.delete_user(alice.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_sqlite_store_listing() {
        let store = store().await;
        let alice = user(&store, 1).await;

        let first = store.create_asciicast(NewAsciicast::new(alice.id)).await.unwrap();
        let hidden = store
            .create_asciicast(NewAsciicast::new(alice.id).private())
            .await
            .unwrap();
        let last = store
            .create_asciicast(NewAsciicast::new(alice.id).with_title("latest"))
            .await
            .unwrap();

        assert_eq!(store.count_asciicasts(alice.id, false).await.unwrap(), 2);
        assert_eq!(store.count_asciicasts(alice.id, true).await.unwrap(), 3);

        let public = store
            .list_asciicasts(alice.id, AsciicastFilter::new())
            .await
            .unwrap();
        assert_eq!(
            public.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![last.id, first.id]
        );
        assert_eq!(public[0].title.as_deref(), Some("latest"));

        let page = store
            .list_asciicasts(
                alice.id,
                AsciicastFilter::new().with_private(true).with_page(1, 1),
            )
            .await
            .unwrap();
        assert_eq!(page.iter().map(|a| a.id).collect::<Vec<_>>(), vec![hidden.id]);

        let sample = store
            .sample_public_asciicasts(alice.id, first.id, 10)
            .await
            .unwrap();
        assert_eq!(sample.iter().map(|a| a.id).collect::<Vec<_>>(), vec![last.id]);
    }
}

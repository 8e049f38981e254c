//! Versioned schema migrations tracked through `PRAGMA user_version`.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::schema::to_db_time;
use crate::{StoreError, StoreResult};

/// Schema version after every migration has run.
pub const LATEST_VERSION: i64 = 2;

/// Attempts per row before the feed token backfill gives up.
const MAX_BACKFILL_ATTEMPTS: u32 = 32;

/// Generates a random token value.
pub type TokenSource<'a> = &'a (dyn Fn() -> String + Send + Sync);

const SCHEMA_V1: &str = r#"
-- Users table
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT,
    temporary_username TEXT,
    email TEXT UNIQUE,
    auth_token TEXT NOT NULL UNIQUE,
    theme_name TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- API tokens table
CREATE TABLE IF NOT EXISTS api_tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    token TEXT NOT NULL UNIQUE,
    revoked_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Asciicasts table
CREATE TABLE IF NOT EXISTS asciicasts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    title TEXT,
    private INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Likes table
CREATE TABLE IF NOT EXISTS likes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    asciicast_id INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

-- Comments table
CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    asciicast_id INTEGER NOT NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Expiring (login) tokens table
CREATE TABLE IF NOT EXISTS expiring_tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    token TEXT NOT NULL UNIQUE,
    expires_at TEXT NOT NULL,
    used_at TEXT,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username_lower ON users (lower(username));
CREATE INDEX IF NOT EXISTS idx_api_tokens_user ON api_tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_asciicasts_user ON asciicasts(user_id);
CREATE INDEX IF NOT EXISTS idx_likes_user ON likes(user_id);
CREATE INDEX IF NOT EXISTS idx_likes_asciicast ON likes(asciicast_id);
CREATE INDEX IF NOT EXISTS idx_comments_user ON comments(user_id);
CREATE INDEX IF NOT EXISTS idx_comments_asciicast ON comments(asciicast_id);
CREATE INDEX IF NOT EXISTS idx_expiring_tokens_user ON expiring_tokens(user_id);
"#;

// SQLite cannot add NOT NULL to an existing column, so the users table is
// rebuilt once every row carries a feed token.
const REBUILD_USERS_WITH_FEED_TOKEN: &str = r#"
CREATE TABLE users_new (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT,
    temporary_username TEXT,
    email TEXT UNIQUE,
    auth_token TEXT NOT NULL UNIQUE,
    feed_token TEXT NOT NULL UNIQUE,
    theme_name TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

INSERT INTO users_new (id, username, temporary_username, email, auth_token, feed_token,
                       theme_name, created_at, updated_at)
SELECT id, username, temporary_username, email, auth_token, feed_token,
       theme_name, created_at, updated_at
FROM users;

DROP TABLE users;
ALTER TABLE users_new RENAME TO users;

CREATE UNIQUE INDEX idx_users_username_lower ON users (lower(username));
"#;

/// Reads the current schema version.
pub async fn schema_version(pool: &SqlitePool) -> StoreResult<i64> {
    Ok(sqlx::query_scalar::<_, i64>("PRAGMA user_version")
        .fetch_one(pool)
        .await?)
}

/// Applies every pending migration up to `target`.
///
/// Each version runs in its own transaction together with the version
/// bump, so a failed step leaves the previous version intact.
pub async fn migrate_to(
    pool: &SqlitePool,
    target: i64,
    generate_token: TokenSource<'_>,
) -> StoreResult<()> {
    let mut version = schema_version(pool).await?;
    if version > LATEST_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {version} is newer than supported version {LATEST_VERSION}"
        )));
    }

    while version < target.min(LATEST_VERSION) {
        let next = version + 1;
        info!(from = version, to = next, "Running schema migration");

        let mut tx = pool.begin().await?;
        match next {
            1 => {
                sqlx::raw_sql(SCHEMA_V1).execute(&mut *tx).await?;
            }
            2 => add_feed_tokens(&mut *tx, generate_token).await?,
            _ => unreachable!("versions are bounded by LATEST_VERSION"),
        }
        sqlx::raw_sql(&format!("PRAGMA user_version = {next}"))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        version = next;
    }

    Ok(())
}

/// Adds the `feed_token` column: nullable first, then backfilled, then
/// tightened to `NOT NULL UNIQUE`.
async fn add_feed_tokens(
    conn: &mut SqliteConnection,
    generate_token: TokenSource<'_>,
) -> StoreResult<()> {
    sqlx::query("ALTER TABLE users ADD COLUMN feed_token TEXT")
        .execute(&mut *conn)
        .await?;

    let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM users WHERE feed_token IS NULL")
        .fetch_all(&mut *conn)
        .await?;

    let now = to_db_time(&Utc::now());
    for id in &ids {
        let mut attempts = 0;
        let token = loop {
            attempts += 1;
            if attempts > MAX_BACKFILL_ATTEMPTS {
                return Err(StoreError::Migration(format!(
                    "no unused feed token for user {id} after {MAX_BACKFILL_ATTEMPTS} attempts"
                )));
            }
            let candidate = generate_token();
            let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE feed_token = ?")
                .bind(&candidate)
                .fetch_one(&mut *conn)
                .await?;
            if taken == 0 {
                break candidate;
            }
            debug!(user_id = id, "Feed token collision during backfill, regenerating");
        };

        sqlx::query("UPDATE users SET feed_token = ?, updated_at = ? WHERE id = ?")
            .bind(&token)
            .bind(&now)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    info!(count = ids.len(), "Backfilled feed tokens");

    sqlx::raw_sql(REBUILD_USERS_WITH_FEED_TOKEN)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

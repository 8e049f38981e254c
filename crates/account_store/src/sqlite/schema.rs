use chrono::{DateTime, SecondsFormat, Utc};
use entities::{ApiToken, Asciicast, Comment, ExpiringToken, Like, User};
use sqlx::FromRow;

/// Columns selected for every user query.
pub const USER_COLUMNS: &str = "id, username, temporary_username, email, auth_token, \
                                feed_token, theme_name, created_at, updated_at";

pub const API_TOKEN_COLUMNS: &str = "id, user_id, token, revoked_at, created_at, updated_at";

pub const ASCIICAST_COLUMNS: &str = "id, user_id, title, private, created_at, updated_at";

/// Formats a timestamp for storage.
///
/// A fixed precision keeps the text ordering identical to the time ordering.
pub fn to_db_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp.
pub fn from_db_time(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Maps a SQLite unique-constraint message to the offending field.
///
/// Column constraints report `table.column`; expression indexes report
/// `index 'name'`.
pub fn unique_field(message: &str) -> Option<&'static str> {
    const FIELDS: [(&str, &str); 6] = [
        ("users.email", "email"),
        ("idx_users_username_lower", "username"),
        ("users.auth_token", "auth_token"),
        ("users.feed_token", "feed_token"),
        ("api_tokens.token", "token"),
        ("expiring_tokens.token", "token"),
    ];

    FIELDS
        .iter()
        .find(|(needle, _)| message.contains(needle))
        .map(|(_, field)| *field)
}

/// Database row for User
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: Option<String>,
    pub temporary_username: Option<String>,
    pub email: Option<String>,
    pub auth_token: String,
    pub feed_token: String,
    pub theme_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            temporary_username: row.temporary_username,
            email: row.email,
            auth_token: row.auth_token,
            feed_token: row.feed_token,
            theme_name: row.theme_name,
            created_at: from_db_time(&row.created_at),
            updated_at: from_db_time(&row.updated_at),
        }
    }
}

/// Database row for ApiToken
#[derive(Debug, FromRow)]
pub struct ApiTokenRow {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub revoked_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ApiTokenRow> for ApiToken {
    fn from(row: ApiTokenRow) -> Self {
        ApiToken {
            id: row.id,
            user_id: row.user_id,
            token: row.token,
            revoked_at: row.revoked_at.as_deref().map(from_db_time),
            created_at: from_db_time(&row.created_at),
            updated_at: from_db_time(&row.updated_at),
        }
    }
}

/// Database row for Asciicast
#[derive(Debug, FromRow)]
pub struct AsciicastRow {
    pub id: i64,
    pub user_id: i64,
    pub title: Option<String>,
    pub private: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<AsciicastRow> for Asciicast {
    fn from(row: AsciicastRow) -> Self {
        Asciicast {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            private: row.private,
            created_at: from_db_time(&row.created_at),
            updated_at: from_db_time(&row.updated_at),
        }
    }
}

/// Database row for Like
#[derive(Debug, FromRow)]
pub struct LikeRow {
    pub id: i64,
    pub user_id: i64,
    pub asciicast_id: i64,
    pub created_at: String,
}

impl From<LikeRow> for Like {
    fn from(row: LikeRow) -> Self {
        Like {
            id: row.id,
            user_id: row.user_id,
            asciicast_id: row.asciicast_id,
            created_at: from_db_time(&row.created_at),
        }
    }
}

/// Database row for Comment
#[derive(Debug, FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub user_id: i64,
    pub asciicast_id: i64,
    pub body: String,
    pub created_at: String,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            user_id: row.user_id,
            asciicast_id: row.asciicast_id,
            body: row.body,
            created_at: from_db_time(&row.created_at),
        }
    }
}

/// Database row for ExpiringToken
#[derive(Debug, FromRow)]
pub struct ExpiringTokenRow {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: String,
    pub used_at: Option<String>,
    pub created_at: String,
}

impl From<ExpiringTokenRow> for ExpiringToken {
    fn from(row: ExpiringTokenRow) -> Self {
        ExpiringToken {
            id: row.id,
            user_id: row.user_id,
            token: row.token,
            expires_at: from_db_time(&row.expires_at),
            used_at: row.used_at.as_deref().map(from_db_time),
            created_at: from_db_time(&row.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_field_mapping() {
        assert_eq!(
            unique_field("UNIQUE constraint failed: users.email"),
            Some("email")
        );
        assert_eq!(
            unique_field("UNIQUE constraint failed: index 'idx_users_username_lower'"),
            Some("username")
        );
        assert_eq!(
            unique_field("UNIQUE constraint failed: users.feed_token"),
            Some("feed_token")
        );
        assert_eq!(unique_field("NOT NULL constraint failed: users.id"), None);
    }

    #[test]
    fn test_db_time_orders_lexically() {
        let earlier: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let later: DateTime<Utc> = "2024-01-01T00:00:00.5Z".parse().unwrap();

        assert!(to_db_time(&earlier) < to_db_time(&later));
        assert_eq!(from_db_time(&to_db_time(&later)), later);
    }
}

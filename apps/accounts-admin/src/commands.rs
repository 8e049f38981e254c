//! Subcommand definitions and execution

use accounts::{AccountError, AccountManager, TokenGenerator};
use account_store::{AccountStore, SqliteAccountStore, LATEST_VERSION};
use clap::{Args, Subcommand};
use entities::{User, UserId};
use serde::Serialize;
use tracing::info;

/// Admin subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply pending schema migrations
    Migrate,

    /// Look up or create the user owning an email address
    Create {
        #[arg(long)]
        email: String,
    },

    /// Show a user
    Show(ShowArgs),

    /// Assign an API token to a user, taking it over from its previous owner
    AssignToken {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        token: String,
    },

    /// Merge one user into another
    Merge {
        #[arg(long)]
        source: UserId,
        #[arg(long)]
        target: UserId,
    },

    /// Delete a user and everything it owns
    Delete {
        #[arg(long)]
        user: UserId,
    },
}

/// Exactly one way to pick the user to show
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct ShowArgs {
    #[arg(long)]
    id: Option<UserId>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    auth_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct UserSummary<'a> {
    #[serde(flatten)]
    user: &'a User,
    display_name: String,
    confirmed: bool,
    admin: bool,
    asciicasts: u64,
    public_asciicasts: u64,
}

/// Command failures
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Database schema is at version {current}, expected {expected}; run `migrate` first")]
    SchemaOutdated { current: i64, expected: i64 },

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Store(#[from] account_store::StoreError),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Runs a command and returns the text to print.
pub async fn execute(
    command: Command,
    store: &SqliteAccountStore,
    manager: &AccountManager,
) -> Result<String, CommandError> {
    if !matches!(command, Command::Migrate) {
        let current = store.schema_version().await?;
        if current != LATEST_VERSION {
            return Err(CommandError::SchemaOutdated {
                current,
                expected: LATEST_VERSION,
            });
        }
    }

    match command {
        Command::Migrate => migrate(store, manager).await,
        Command::Create { email } => {
            let user = manager.lookup_or_create_by_email(Some(email.as_str())).await?;
            summarize(manager, &user).await
        }
        Command::Show(args) => {
            let user = find_user(manager, args).await?;
            summarize(manager, &user).await
        }
        Command::AssignToken { user, token } => {
            let user = get_user(manager, user).await?;
            let api_token = manager.assign_api_token(&user, &token).await?;
            Ok(format!(
                "API token {} now belongs to user {}",
                api_token.id, api_token.user_id
            ))
        }
        Command::Merge { source, target } => {
            let source = get_user(manager, source).await?;
            let target = get_user(manager, target).await?;
            manager.merge_into(&source, &target).await?;
            Ok(format!("merged user {} into user {}", source.id, target.id))
        }
        Command::Delete { user } => {
            let user = get_user(manager, user).await?;
            manager.delete_user(&user).await?;
            Ok(format!("deleted user {}", user.id))
        }
    }
}

async fn migrate(
    store: &SqliteAccountStore,
    manager: &AccountManager,
) -> Result<String, CommandError> {
    let tokens = manager.tokens().clone();
    let generate = move || tokens.generate();
    store.migrate(&generate).await?;

    let version = store.schema_version().await?;
    info!(version, "Schema is up to date");
    Ok(format!("schema version {version}"))
}

async fn get_user(manager: &AccountManager, id: UserId) -> Result<User, CommandError> {
    manager
        .store()
        .get_user(id)
        .await?
        .ok_or_else(|| AccountError::not_found("User", id.to_string()).into())
}

async fn find_user(manager: &AccountManager, args: ShowArgs) -> Result<User, CommandError> {
    if let Some(id) = args.id {
        return get_user(manager, id).await;
    }
    if let Some(username) = args.username {
        return Ok(manager.lookup_by_username(&username).await?);
    }

    let (found, key) = if let Some(email) = args.email {
        (manager.store().find_user_by_email(email.trim()).await?, email)
    } else if let Some(token) = args.auth_token {
        (manager.lookup_by_auth_token(&token).await?, "auth token".to_string())
    } else {
        (None, String::new())
    };
    found.ok_or_else(|| AccountError::not_found("User", key).into())
}

async fn summarize(manager: &AccountManager, user: &User) -> Result<String, CommandError> {
    let summary = UserSummary {
        user,
        display_name: user.display_name(),
        confirmed: user.is_confirmed(),
        admin: manager.is_admin(user),
        asciicasts: manager.asciicast_count(user).await?,
        public_asciicasts: manager.public_asciicast_count(user).await?,
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use accounts::AccountsConfig;
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Command,
    }

    fn parse(args: &[&str]) -> Command {
        let argv = std::iter::once("accounts-admin").chain(args.iter().copied());
        TestCli::try_parse_from(argv).unwrap().command
    }

    async fn setup() -> (SqliteAccountStore, AccountManager) {
        let store = SqliteAccountStore::connect("sqlite::memory:").await.unwrap();
        let config = AccountsConfig {
            admin_ids: vec![1],
            ..AccountsConfig::default()
        };
        let manager = AccountManager::with_defaults(Arc::new(store.clone()), config);
        (store, manager)
    }

    #[test]
    fn test_show_requires_exactly_one_key() {
        assert!(TestCli::try_parse_from(["accounts-admin", "show"]).is_err());
        assert!(TestCli::try_parse_from([
            "accounts-admin",
            "show",
            "--id",
            "1",
            "--username",
            "bob"
        ])
        .is_err());
        assert!(matches!(
            parse(&["show", "--auth-token", "abc"]),
            Command::Show(_)
        ));
    }

    #[tokio::test]
    async fn test_commands_require_migration() {
        let (store, manager) = setup().await;

        let err = execute(parse(&["create", "--email", "a@example.com"]), &store, &manager)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::SchemaOutdated { current: 0, .. }
        ));

        let output = execute(parse(&["migrate"]), &store, &manager).await.unwrap();
        assert_eq!(output, format!("schema version {LATEST_VERSION}"));
    }

    #[tokio::test]
    async fn test_account_lifecycle() {
        let (store, manager) = setup().await;
        execute(parse(&["migrate"]), &store, &manager).await.unwrap();

        let output = execute(
            parse(&["create", "--email", "alice@example.com"]),
            &store,
            &manager,
        )
        .await
        .unwrap();
        let alice: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(alice["id"], 1);
        assert_eq!(alice["email"], "alice@example.com");
        assert_eq!(alice["admin"], true);
        assert_eq!(alice["confirmed"], true);

        execute(
            parse(&["create", "--email", "bob@example.com"]),
            &store,
            &manager,
        )
        .await
        .unwrap();

        execute(
            parse(&["assign-token", "--user", "1", "--token", "install-1"]),
            &store,
            &manager,
        )
        .await
        .unwrap();

        let output = execute(
            parse(&["merge", "--source", "1", "--target", "2"]),
            &store,
            &manager,
        )
        .await
        .unwrap();
        assert_eq!(output, "merged user 1 into user 2");

        let owner = manager
            .lookup_by_api_token(Some("install-1"))
            .await
            .unwrap();
        assert_eq!(owner.map(|u| u.id), Some(2));

        let err = execute(parse(&["show", "--id", "1"]), &store, &manager)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Account(AccountError::NotFound { .. })
        ));

        let output = execute(
            parse(&["show", "--email", "bob@example.com"]),
            &store,
            &manager,
        )
        .await
        .unwrap();
        let bob: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(bob["admin"], false);

        execute(parse(&["delete", "--user", "2"]), &store, &manager)
            .await
            .unwrap();
        assert!(store.get_user(2).await.unwrap().is_none());
    }
}

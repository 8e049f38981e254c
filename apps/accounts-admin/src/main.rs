//! Accounts admin CLI
//!
//! Operator tool for the account database:
//! - Schema migrations
//! - User lookup, creation and deletion
//! - API token assignment and account merging

use std::path::PathBuf;
use std::sync::Arc;

use accounts::{AccountManager, BuiltinThemes, UrlSafeTokenGenerator};
use account_store::SqliteAccountStore;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::Command;
use config::AdminConfig;

#[derive(Debug, Parser)]
#[command(name = "accounts-admin", version, about = "Manage asciicast user accounts")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Database URL, overriding the configuration
    #[arg(long, global = true, value_name = "URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = AdminConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    // Initialize tracing
    let log_level = match config.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "accounts_admin={0},accounts={0},account_store={0},sqlx=warn",
                    log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        database_url = %config.database_url,
        "Starting accounts admin"
    );

    let store = SqliteAccountStore::connect(&config.database_url).await?;
    let manager = AccountManager::new(
        Arc::new(store.clone()),
        Arc::new(UrlSafeTokenGenerator::new(config.accounts.token_bytes)),
        Arc::new(BuiltinThemes),
        config.accounts.clone(),
    );

    match commands::execute(cli.command, &store, &manager).await {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            Err(e.into())
        }
    }
}

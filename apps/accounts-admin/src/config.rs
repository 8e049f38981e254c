//! Admin CLI configuration

use std::path::{Path, PathBuf};

use accounts::AccountsConfig;
use entities::UserId;
use serde::{Deserialize, Serialize};

/// Admin CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Account manager settings
    #[serde(default)]
    pub accounts: AccountsConfig,
}

fn default_database_url() -> String {
    "sqlite:accounts.db?mode=rwc".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            log_level: default_log_level(),
            accounts: AccountsConfig::default(),
        }
    }
}

impl AdminConfig {
    /// Load configuration from environment and an optional config file
    ///
    /// An explicit `path` must exist; otherwise the standard locations are
    /// searched.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        // Start with defaults, then override with environment variables
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());

        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };

        if let Some(config_path) = config_path {
            let contents = std::fs::read_to_string(&config_path)?;
            let file_config = toml::from_str::<AdminConfig>(&contents)?;
            config.merge_file(file_config);
        }

        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("ACCOUNTS_DATABASE_URL") {
            self.database_url = url;
        }

        if let Some(ids) = var("ACCOUNTS_ADMIN_IDS") {
            self.accounts.admin_ids = parse_admin_ids(&ids);
        }

        if let Some(level) = var("ACCOUNTS_LOG_LEVEL") {
            self.log_level = level;
        }

        if let Some(bytes) = var("ACCOUNTS_TOKEN_BYTES") {
            self.accounts.token_bytes = bytes.parse().unwrap_or(self.accounts.token_bytes);
        }
    }

    /// Merge file config (env takes precedence)
    fn merge_file(&mut self, file_config: AdminConfig) {
        let defaults = Self::default();

        if self.database_url == defaults.database_url {
            self.database_url = file_config.database_url;
        }
        if self.log_level == defaults.log_level {
            self.log_level = file_config.log_level;
        }
        if self.accounts.admin_ids.is_empty() {
            self.accounts.admin_ids = file_config.accounts.admin_ids;
        }
        if self.accounts.token_bytes == defaults.accounts.token_bytes {
            self.accounts.token_bytes = file_config.accounts.token_bytes;
        }
        if self.accounts.max_token_attempts == defaults.accounts.max_token_attempts {
            self.accounts.max_token_attempts = file_config.accounts.max_token_attempts;
        }
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let locations = [
            PathBuf::from("accounts-admin.toml"),
            PathBuf::from("/etc/accounts/admin.toml"),
            dirs::config_dir()
                .map(|p| p.join("accounts").join("admin.toml"))
                .unwrap_or_default(),
        ];

        locations
            .into_iter()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
    }
}

/// Parses a comma separated id list, skipping entries that are not ids.
fn parse_admin_ids(value: &str) -> Vec<UserId> {
    value
        .split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdminConfig::default();
        assert_eq!(config.database_url, "sqlite:accounts.db?mode=rwc");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.accounts.token_bytes, 16);
    }

    #[test]
    fn test_env_overrides() {
        let vars = HashMap::from([
            ("ACCOUNTS_DATABASE_URL", "sqlite::memory:"),
            ("ACCOUNTS_ADMIN_IDS", "1, 2,nope,7"),
            ("ACCOUNTS_TOKEN_BYTES", "24"),
        ]);

        let mut config = AdminConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.accounts.admin_ids, vec![1, 2, 7]);
        assert_eq!(config.accounts.token_bytes, 24);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_env_takes_precedence_over_file() {
        let file_config: AdminConfig = toml::from_str(
            r#"
            database_url = "sqlite:/var/lib/accounts.db"
            log_level = "debug"

            [accounts]
            admin_ids = [3]
            max_token_attempts = 20
            "#,
        )
        .unwrap();

        let mut config = AdminConfig::default();
        config.database_url = "sqlite::memory:".to_string();
        config.merge_file(file_config);

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.accounts.admin_ids, vec![3]);
        assert_eq!(config.accounts.max_token_attempts, 20);
        assert_eq!(config.accounts.token_bytes, 16);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = AdminConfig::load(Some(Path::new("/nonexistent/accounts-admin.toml")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(_)));
    }
}

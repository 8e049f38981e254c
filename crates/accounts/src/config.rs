//! Account manager configuration

use entities::UserId;
use serde::{Deserialize, Serialize};

/// Settings injected into the account manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// Users with administrator rights
    #[serde(default)]
    pub admin_ids: Vec<UserId>,

    /// Random bytes per generated token
    #[serde(default = "default_token_bytes")]
    pub token_bytes: usize,

    /// Attempts before token generation gives up
    #[serde(default = "default_max_token_attempts")]
    pub max_token_attempts: u32,
}

fn default_token_bytes() -> usize {
    16
}

fn default_max_token_attempts() -> u32 {
    10
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            admin_ids: Vec::new(),
            token_bytes: default_token_bytes(),
            max_token_attempts: default_max_token_attempts(),
        }
    }
}

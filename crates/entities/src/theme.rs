//! Player theme definitions.

use serde::{Deserialize, Serialize};

/// A terminal player color theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    /// Identifier stored on the user.
    pub name: String,
    /// Label shown in theme pickers.
    pub label: String,
}

impl Theme {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

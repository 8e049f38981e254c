//! User account management for asciicast accounts.
//!
//! This crate provides:
//! - Lookup and creation of users by email, username and tokens
//! - Collision-checked generation of auth, feed and login tokens
//! - API token assignment, account merging and validated profile saves
//! - Theme resolution and admin checks driven by injected configuration

mod config;
mod error;
mod manager;
mod theme;
mod tokens;

pub use config::*;
pub use error::*;
pub use manager::*;
pub use theme::*;
pub use tokens::*;

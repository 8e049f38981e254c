//! User account storage
//!
//! This crate provides a storage abstraction for users, API tokens and the
//! records users own. It ships an in-memory store for tests and a SQLite
//! store with versioned migrations.

mod error;
mod memory;
pub mod sqlite;
mod traits;

pub use error::*;
pub use memory::MemoryAccountStore;
pub use sqlite::{SqliteAccountStore, TokenSource, LATEST_VERSION};
pub use traits::*;

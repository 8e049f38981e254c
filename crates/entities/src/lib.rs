//! Core entity definitions for asciicast accounts.
//!
//! This crate defines the data types shared by the account store and the
//! account manager: users, the records a user owns (API tokens, asciicasts,
//! likes, comments, expiring tokens), themes, and the validation rules that
//! apply to user profiles.

mod api_token;
mod asciicast;
mod engagement;
mod expiring_token;
mod identity;
mod theme;
mod token;
mod user;
mod validation;

pub use api_token::*;
pub use asciicast::*;
pub use engagement::*;
pub use expiring_token::*;
pub use identity::*;
pub use theme::*;
pub use token::*;
pub use user::*;
pub use validation::*;

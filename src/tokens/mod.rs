//! Single-use, purpose-scoped tokens for account workflows.
//!
//! A token is issued unbound, bound to a [`TokenPurpose`] (and usually an
//! email address) by the workflow that sends it out, and redeemed at most
//! once by presenting the same purpose. Redemption is permanent.

mod error;
mod service;

pub use crate::db::models::{Token, TokenPurpose};
pub use error::TokenError;
pub use service::TokenService;

//! Google API integration
//!
//! This module provides:
//! - OAuth2 credential provider (code exchange, refresh, interactive login)
//! - Sheets values API client implementing [`crate::store::GridStore`]

mod auth;
mod sheets;

pub use auth::{GoogleAuth, TokenInfo, TokenResponse};
pub use sheets::{SheetsClient, SheetsFactory};

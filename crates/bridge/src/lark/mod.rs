//! Lark/Feishu open-platform integration
//!
//! Bitable API client implementing [`crate::store::RecordStore`], with a
//! mutex-guarded tenant access-token cache.

mod bitable;

pub use bitable::{BitableClient, PacingPolicy};

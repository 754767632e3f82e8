//! Bridge crate - Business logic for spreadsheet/record-table synchronization
//!
//! This crate keeps a Google Sheets spreadsheet and a Lark/Feishu Bitable
//! table in agreement by full replacement, in either direction, for a
//! registry of configured pairings. It provides:
//! - Domain models (Pairing, Record, FieldValue, SyncResult)
//! - Google OAuth token exchange and Sheets API client
//! - Lark Bitable API client with a cached tenant access token
//! - Store trait abstractions with in-memory implementations for tests
//! - The full-replace sync engine for both directions
//! - Batch orchestration with per-pairing failure isolation and audit logging
//! - Authenticated encryption of stored refresh credentials
//!
//! This crate has no UI dependencies; binaries drive it through the
//! orchestrator entry points in [`sync`].

pub mod a1;
pub mod config;
pub mod crypto;
pub mod error;
pub mod google;
pub mod history;
pub mod lark;
pub mod links;
pub mod models;
pub mod registry;
pub mod store;
pub mod sync;

pub use config::{GoogleCredentials, LarkCredentials, SyncConfig};
pub use error::{Error, Result};
pub use google::{GoogleAuth, SheetsClient, SheetsFactory, TokenResponse};
pub use lark::{BitableClient, PacingPolicy};
pub use models::{Direction, FieldMap, FieldValue, Pairing, Record, SyncResult};
pub use store::{GridStore, InMemoryGridStore, InMemoryRecordStore, RecordStore};
pub use sync::{
    BatchContext, BatchReport, GridStoreFactory, ManualPair, PairOutcome, PairStatus, SyncOptions,
    TokenRefresher, run_manual, run_unattended, sync_pair,
};

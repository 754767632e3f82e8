//! Sync engine and batch orchestration
//!
//! [`engine`] performs one full-replace synchronization pass for a resolved
//! pairing; [`batch`] iterates pairings with per-pairing failure isolation
//! and audit logging.

mod batch;
mod engine;

pub use batch::{
    BatchContext, BatchReport, GridStoreFactory, ManualPair, PairOutcome, PairStatus,
    TokenRefresher, run_manual, run_unattended,
};
pub use engine::{SyncOptions, sync_grid_to_records, sync_pair, sync_records_to_grid};

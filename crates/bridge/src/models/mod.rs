//! Domain models for sync entities

mod pairing;
mod value;

pub use pairing::{Direction, Pairing};
pub use value::{FieldMap, FieldValue, Record};

use serde::Serialize;

/// Outcome of one synchronization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// Rows written (records-to-grid) or records created (grid-to-records).
    pub row_count: usize,
    /// True only for records-to-grid when the source held more items than
    /// the configured per-run cap.
    pub truncated: bool,
}

//! Append-only audit log of sync attempts
//!
//! Every attempt, successful or not, becomes one appended row in the
//! history tab: timestamp, the pairing's two URLs, direction, actor,
//! row count, a Success/Error marker and the error text when present.

use chrono::{SecondsFormat, Utc};

use crate::error::Result;
use crate::models::Direction;
use crate::store::GridStore;

/// Outcome marker stored in the audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Success,
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "Success",
            AuditStatus::Error => "Error",
        }
    }
}

/// One audit row before serialization to cells.
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    pub sheet_url: &'a str,
    pub base_url: &'a str,
    pub direction: Direction,
    /// Who triggered the attempt: an email, "cron" or "manual".
    pub actor: &'a str,
    pub row_count: usize,
    pub status: AuditStatus,
    /// Empty on success.
    pub error: &'a str,
}

/// Audit log writer over any grid store.
pub struct HistoryLog<'a> {
    grid: &'a dyn GridStore,
    spreadsheet_id: &'a str,
    tab: &'a str,
}

impl<'a> HistoryLog<'a> {
    pub fn new(grid: &'a dyn GridStore, spreadsheet_id: &'a str, tab: &'a str) -> Self {
        Self {
            grid,
            spreadsheet_id,
            tab,
        }
    }

    /// Append one attempt. Rows are never updated or removed afterwards.
    pub fn append_attempt(&self, entry: &AuditEntry) -> Result<()> {
        let row = vec![
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            entry.sheet_url.to_string(),
            entry.base_url.to_string(),
            entry.direction.as_str().to_string(),
            entry.actor.to_string(),
            entry.row_count.to_string(),
            entry.status.as_str().to_string(),
            entry.error.to_string(),
        ];
        let range = format!("{}!A:H", self.tab);
        self.grid.append_row(self.spreadsheet_id, &range, &row)
    }
}

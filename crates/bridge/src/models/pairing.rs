//! Pairing model representing one configured sync relationship.

use serde::{Deserialize, Serialize};

/// Sync direction, from the record-table's perspective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Record table is the source of truth; the sheet is overwritten.
    #[default]
    #[serde(rename = "lark-to-sheet")]
    RecordsToGrid,
    /// Sheet is the source of truth; the record table is overwritten.
    #[serde(rename = "sheet-to-lark")]
    GridToRecords,
}

impl Direction {
    /// Wire string, as stored in the registry and audit log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::RecordsToGrid => "lark-to-sheet",
            Direction::GridToRecords => "sheet-to-lark",
        }
    }

    /// Parse a registry cell. Anything other than the explicit
    /// grid-to-records string falls back to the default direction.
    pub fn parse(s: &str) -> Self {
        if s == "sheet-to-lark" {
            Direction::GridToRecords
        } else {
            Direction::RecordsToGrid
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered synchronization relationship, read from a registry row.
///
/// Mutable only in `active` and `last_synced_at`, and only through targeted
/// registry column updates; the sync engine treats pairings as read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pairing {
    /// 1-based registry row index (data starts at row 2); the durable
    /// identifier for targeted column updates.
    pub row_id: usize,
    pub created_at: String,
    pub sheet_url: String,
    pub sheet_id: String,
    pub base_url: String,
    pub base_id: String,
    pub table_id: String,
    pub direction: Direction,
    /// Free-text identity string for audit attribution.
    pub owner: String,
    /// Sealed refresh credential (see [`crate::crypto`]).
    pub credential_enc: String,
    /// Soft-delete flag; inactive pairings are excluded from unattended runs.
    pub active: bool,
    pub last_synced_at: String,
    /// Free text, never programmatically mutated.
    pub notes: String,
}

impl Pairing {
    /// Number of registry columns (A through L).
    pub const COLUMNS: usize = 12;

    /// Parse a registry data row. `row_id` is the sheet row the data came
    /// from (first data row is 2). Missing trailing cells become defaults.
    pub fn from_row(row_id: usize, row: &[String]) -> Self {
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        Self {
            row_id,
            created_at: cell(0),
            sheet_url: cell(1),
            sheet_id: cell(2),
            base_url: cell(3),
            base_id: cell(4),
            table_id: cell(5),
            direction: Direction::parse(&cell(6)),
            owner: cell(7),
            credential_enc: cell(8),
            // Blank defaults to TRUE; only an explicit FALSE deactivates.
            active: !cell(9).trim().eq_ignore_ascii_case("false"),
            last_synced_at: cell(10),
            notes: cell(11),
        }
    }

    /// Whether this pairing can be synchronized at all. Unattended runs
    /// additionally require a stored credential.
    pub fn is_eligible(&self, unattended: bool) -> bool {
        let ids = !self.sheet_id.is_empty() && !self.base_id.is_empty() && !self.table_id.is_empty();
        ids && (!unattended || !self.credential_enc.is_empty())
    }
}

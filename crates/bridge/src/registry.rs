//! Pairing registry persisted as spreadsheet rows
//!
//! The registry lives in a tab of the history spreadsheet, columns A..L
//! (see [`Pairing::from_row`] for the layout). The sheet row index is the
//! durable identifier used for targeted column updates; rows are never
//! reordered or deleted, deactivation is a soft flag in column J.

use chrono::{SecondsFormat, Utc};
use log::debug;

use crate::error::Result;
use crate::models::Pairing;
use crate::store::GridStore;

/// Registry access over any grid store.
pub struct PairsRegistry<'a> {
    grid: &'a dyn GridStore,
    spreadsheet_id: &'a str,
    tab: &'a str,
}

impl<'a> PairsRegistry<'a> {
    /// Scan window for full reads; registries stay far below this.
    const SCAN_ROWS: usize = 20_000;
    /// Column J holds the active flag.
    const ACTIVE_COL: char = 'J';
    /// Column K holds the last-synced timestamp.
    const LAST_SYNCED_COL: char = 'K';

    pub fn new(grid: &'a dyn GridStore, spreadsheet_id: &'a str, tab: &'a str) -> Self {
        Self {
            grid,
            spreadsheet_id,
            tab,
        }
    }

    /// Read every data row as a [`Pairing`], skipping the header. No
    /// filtering is applied here; callers select on activity/eligibility.
    pub fn read_pairings(&self) -> Result<Vec<Pairing>> {
        let range = format!("{}!A1:L{}", self.tab, Self::SCAN_ROWS);
        let rows = self.grid.get_values(self.spreadsheet_id, &range)?;
        if rows.len() <= 1 {
            return Ok(Vec::new());
        }
        let pairings: Vec<Pairing> = rows
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, row)| Pairing::from_row(i + 1, row))
            .collect();
        debug!("registry read: {} rows", pairings.len());
        Ok(pairings)
    }

    /// Read one registry row by its durable row index.
    pub fn get(&self, row_id: usize) -> Result<Option<Pairing>> {
        let range = format!("{}!A{}:L{}", self.tab, row_id, row_id);
        let rows = self.grid.get_values(self.spreadsheet_id, &range)?;
        Ok(rows.into_iter().next().map(|row| Pairing::from_row(row_id, &row)))
    }

    /// Stamp a pairing's last-synced marker with the current time.
    pub fn update_last_synced(&self, row_id: usize) -> Result<()> {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.update_cell(Self::LAST_SYNCED_COL, row_id, stamp)
    }

    /// Flip a pairing's soft-delete flag.
    pub fn set_active(&self, row_id: usize, active: bool) -> Result<()> {
        let value = if active { "TRUE" } else { "FALSE" };
        self.update_cell(Self::ACTIVE_COL, row_id, value.to_string())
    }

    /// Register a new pairing as an appended row.
    pub fn append(&self, pairing: &Pairing) -> Result<()> {
        let created_at = if pairing.created_at.is_empty() {
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        } else {
            pairing.created_at.clone()
        };
        let row = vec![
            created_at,
            pairing.sheet_url.clone(),
            pairing.sheet_id.clone(),
            pairing.base_url.clone(),
            pairing.base_id.clone(),
            pairing.table_id.clone(),
            pairing.direction.as_str().to_string(),
            pairing.owner.clone(),
            pairing.credential_enc.clone(),
            if pairing.active { "TRUE" } else { "FALSE" }.to_string(),
            pairing.last_synced_at.clone(),
            pairing.notes.clone(),
        ];
        let range = format!("{}!A:L", self.tab);
        self.grid.append_row(self.spreadsheet_id, &range, &row)
    }

    fn update_cell(&self, col: char, row_id: usize, value: String) -> Result<()> {
        let range = format!("{tab}!{col}{row}:{col}{row}", tab = self.tab, row = row_id);
        self.grid
            .update_range(self.spreadsheet_id, &range, &[vec![value]])
    }
}

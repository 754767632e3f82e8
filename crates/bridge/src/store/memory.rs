//! In-memory store implementations
//!
//! Used by the test suites to exercise engine and orchestrator semantics
//! without HTTP. The grid implementation understands the subset of A1
//! notation the sync paths emit (see [`crate::a1`]).

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use super::{GridStore, RecordStore};
use crate::a1;
use crate::error::{Error, Result};
use crate::models::{FieldMap, Record};

fn grid_key(spreadsheet_id: &str, tab: Option<&str>) -> String {
    format!("{}::{}", spreadsheet_id, tab.unwrap_or(""))
}

fn table_key(base_id: &str, table_id: &str) -> String {
    format!("{}::{}", base_id, table_id)
}

/// Resolved inclusive bounds of a parsed range (1-based, open ends maxed).
struct Bounds {
    start_col: usize,
    start_row: usize,
    end_col: usize,
    end_row: usize,
}

fn bounds(range: &str) -> Result<(Option<String>, Bounds)> {
    let r = a1::parse_range(range)
        .ok_or_else(|| Error::validation(format!("unsupported range: {}", range)))?;
    let start_col = r.start.col.unwrap_or(1);
    let start_row = r.start.row.unwrap_or(1);
    let (end_col, end_row) = match r.end {
        Some(e) => (e.col.unwrap_or(usize::MAX), e.row.unwrap_or(usize::MAX)),
        None => (start_col, start_row),
    };
    Ok((
        r.tab,
        Bounds {
            start_col,
            start_row,
            end_col,
            end_row,
        },
    ))
}

/// In-memory implementation of [`GridStore`].
#[derive(Default)]
pub struct InMemoryGridStore {
    sheets: RwLock<HashMap<String, Vec<Vec<String>>>>,
}

impl InMemoryGridStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a tab's contents wholesale (test setup).
    pub fn seed<R, C, S>(&self, spreadsheet_id: &str, tab: &str, rows: R)
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(Into::into).collect())
            .collect();
        self.sheets
            .write()
            .unwrap()
            .insert(grid_key(spreadsheet_id, Some(tab).filter(|t| !t.is_empty())), rows);
    }

    /// Snapshot a tab's rows (test assertions). Empty tab name addresses the
    /// default tab, the one un-prefixed ranges hit.
    pub fn rows(&self, spreadsheet_id: &str, tab: &str) -> Vec<Vec<String>> {
        self.sheets
            .read()
            .unwrap()
            .get(&grid_key(spreadsheet_id, Some(tab).filter(|t| !t.is_empty())))
            .cloned()
            .unwrap_or_default()
    }
}

impl GridStore for InMemoryGridStore {
    fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let (tab, b) = bounds(range)?;
        let sheets = self.sheets.read().unwrap();
        let Some(grid) = sheets.get(&grid_key(spreadsheet_id, tab.as_deref())) else {
            return Ok(Vec::new());
        };

        let mut out: Vec<Vec<String>> = Vec::new();
        for row in grid
            .iter()
            .skip(b.start_row - 1)
            .take(b.end_row.saturating_sub(b.start_row - 1))
        {
            let hi = b.end_col.min(row.len());
            let mut cells: Vec<String> = if b.start_col <= hi {
                row[b.start_col - 1..hi].to_vec()
            } else {
                Vec::new()
            };
            // The values API never pads trailing empties.
            while cells.last().is_some_and(|c| c.is_empty()) {
                cells.pop();
            }
            out.push(cells);
        }
        while out.last().is_some_and(|r| r.is_empty()) {
            out.pop();
        }
        Ok(out)
    }

    fn clear_range(&self, spreadsheet_id: &str, range: &str) -> Result<()> {
        let (tab, b) = bounds(range)?;
        let mut sheets = self.sheets.write().unwrap();
        let Some(grid) = sheets.get_mut(&grid_key(spreadsheet_id, tab.as_deref())) else {
            return Ok(());
        };

        for row in grid
            .iter_mut()
            .skip(b.start_row - 1)
            .take(b.end_row.saturating_sub(b.start_row - 1))
        {
            let hi = b.end_col.min(row.len());
            for cell in row[(b.start_col - 1).min(hi)..hi].iter_mut() {
                cell.clear();
            }
        }
        while grid
            .last()
            .is_some_and(|r| r.iter().all(|c| c.is_empty()))
        {
            grid.pop();
        }
        Ok(())
    }

    fn update_range(&self, spreadsheet_id: &str, range: &str, rows: &[Vec<String>]) -> Result<()> {
        let (tab, b) = bounds(range)?;
        let mut sheets = self.sheets.write().unwrap();
        let grid = sheets
            .entry(grid_key(spreadsheet_id, tab.as_deref()))
            .or_default();

        for (i, row) in rows.iter().enumerate() {
            let target = b.start_row - 1 + i;
            if grid.len() <= target {
                grid.resize_with(target + 1, Vec::new);
            }
            let line = &mut grid[target];
            for (j, cell) in row.iter().enumerate() {
                let col = b.start_col - 1 + j;
                if line.len() <= col {
                    line.resize_with(col + 1, String::new);
                }
                line[col] = cell.clone();
            }
        }
        Ok(())
    }

    fn append_row(&self, spreadsheet_id: &str, range: &str, row: &[String]) -> Result<()> {
        let (tab, _) = bounds(range)?;
        let mut sheets = self.sheets.write().unwrap();
        sheets
            .entry(grid_key(spreadsheet_id, tab.as_deref()))
            .or_default()
            .push(row.to_vec());
        Ok(())
    }
}

/// In-memory implementation of [`RecordStore`].
///
/// Assigns monotonically increasing creation timestamps so that listing
/// order reflects creation order, the property the real store's
/// created-time sort relies on.
#[derive(Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
    clock: AtomicI64,
}

impl InMemoryRecordStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert pre-existing records with explicit creation times (test setup).
    pub fn seed(&self, base_id: &str, table_id: &str, records: Vec<Record>) {
        let max_time = records.iter().map(|r| r.created_time).max().unwrap_or(0);
        self.clock.fetch_max(max_time, Ordering::SeqCst);
        self.tables
            .write()
            .unwrap()
            .insert(table_key(base_id, table_id), records);
    }

    /// Snapshot a table's records in creation order (test assertions).
    pub fn records(&self, base_id: &str, table_id: &str) -> Vec<Record> {
        let mut records = self
            .tables
            .read()
            .unwrap()
            .get(&table_key(base_id, table_id))
            .cloned()
            .unwrap_or_default();
        records.sort_by_key(|r| r.created_time);
        records
    }
}

impl RecordStore for InMemoryRecordStore {
    fn list_all(&self, base_id: &str, table_id: &str) -> Result<Vec<Record>> {
        Ok(self.records(base_id, table_id))
    }

    fn delete_all(&self, base_id: &str, table_id: &str) -> Result<usize> {
        let mut tables = self.tables.write().unwrap();
        let deleted = tables
            .get_mut(&table_key(base_id, table_id))
            .map(std::mem::take)
            .map(|records| records.len())
            .unwrap_or(0);
        Ok(deleted)
    }

    fn create_sequential(&self, base_id: &str, table_id: &str, rows: &[FieldMap]) -> Result<usize> {
        let mut tables = self.tables.write().unwrap();
        let table = tables.entry(table_key(base_id, table_id)).or_default();
        for fields in rows {
            let stamp = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
            table.push(Record::new(format!("rec{:06}", stamp), stamp, fields.clone()));
        }
        Ok(rows.len())
    }
}

//! Full-replace sync engine
//!
//! Both directions replace the destination's entire row/record set on every
//! run. That trades write amplification for a trivially correct consistency
//! model: no diffing, no per-row identity correlation across the two
//! systems, no merge logic. The per-run cap exists because both stores have
//! finite practical request budgets; truncation is reported, never hidden.

use log::info;

use crate::a1::column_letters;
use crate::error::{Error, Result};
use crate::models::{Direction, FieldMap, FieldValue, SyncResult};
use crate::store::{GridStore, RecordStore};

/// Tunables for one sync pass.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Maximum source rows/records consumed per run.
    pub max_rows: usize,
    /// Rows per ranged update when writing to the grid.
    pub chunk_rows: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_rows: 5000,
            chunk_rows: 1000,
        }
    }
}

impl SyncOptions {
    pub fn with_max_rows(max_rows: usize) -> Self {
        Self {
            max_rows,
            ..Self::default()
        }
    }
}

/// Read row 1 of a sheet as the authoritative header.
fn read_header(grid: &dyn GridStore, sheet_id: &str) -> Result<Vec<String>> {
    let mut rows = grid.get_values(sheet_id, "A1:1")?;
    let headers = if rows.is_empty() { Vec::new() } else { rows.remove(0) };
    if headers.is_empty() {
        return Err(Error::schema(
            "sheet has no header row (row 1 must contain headers)",
        ));
    }
    Ok(headers)
}

/// One sync pass with the record table as the source of truth.
///
/// Projects each record's fields onto the sheet header in header order
/// (absent fields become empty cells), clears every data row below the
/// header, and rewrites the projection from row 2 in chunks.
pub fn sync_records_to_grid(
    grid: &dyn GridStore,
    records: &dyn RecordStore,
    sheet_id: &str,
    base_id: &str,
    table_id: &str,
    options: &SyncOptions,
) -> Result<SyncResult> {
    let headers = read_header(grid, sheet_id)?;

    let items = records.list_all(base_id, table_id)?;
    let truncated = items.len() > options.max_rows;
    let limited = &items[..items.len().min(options.max_rows)];

    let rows: Vec<Vec<String>> = limited
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|h| {
                    record
                        .fields
                        .get(h)
                        .map(FieldValue::to_cell_string)
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    let end_col = column_letters(headers.len());
    grid.clear_range(sheet_id, &format!("A2:{}", end_col))?;

    for (i, chunk) in rows.chunks(options.chunk_rows.max(1)).enumerate() {
        let start_row = 2 + i * options.chunk_rows.max(1);
        let range = format!(
            "A{}:{}{}",
            start_row,
            end_col,
            start_row + chunk.len() - 1
        );
        grid.update_range(sheet_id, &range, chunk)?;
    }

    info!(
        "records-to-grid: wrote {} rows to {} (truncated: {})",
        rows.len(),
        sheet_id,
        truncated
    );
    Ok(SyncResult {
        row_count: rows.len(),
        truncated,
    })
}

/// One sync pass with the sheet as the source of truth.
///
/// Reads up to the cap of data rows beneath the header, then destructively
/// replaces the record table: delete everything, recreate in row order so
/// the table's default creation-time ordering matches the sheet. Never
/// truncates because the read itself is bounded at the cap.
pub fn sync_grid_to_records(
    grid: &dyn GridStore,
    records: &dyn RecordStore,
    sheet_id: &str,
    base_id: &str,
    table_id: &str,
    options: &SyncOptions,
) -> Result<SyncResult> {
    let headers = read_header(grid, sheet_id)?;

    let end_col = column_letters(headers.len());
    let range = format!("A2:{}{}", end_col, options.max_rows + 1);
    let values = grid.get_values(sheet_id, &range)?;

    let rows: Vec<FieldMap> = values
        .iter()
        .map(|row| {
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    let cell = row.get(i).cloned().unwrap_or_default();
                    (h.clone(), FieldValue::Text(cell))
                })
                .collect()
        })
        .collect();

    records.delete_all(base_id, table_id)?;
    let created = records.create_sequential(base_id, table_id, &rows)?;

    info!(
        "grid-to-records: replaced {}/{} with {} records from {}",
        base_id, table_id, created, sheet_id
    );
    Ok(SyncResult {
        row_count: created,
        truncated: false,
    })
}

/// Run one pass in the given direction.
pub fn sync_pair(
    grid: &dyn GridStore,
    records: &dyn RecordStore,
    sheet_id: &str,
    base_id: &str,
    table_id: &str,
    direction: Direction,
    options: &SyncOptions,
) -> Result<SyncResult> {
    match direction {
        Direction::RecordsToGrid => {
            sync_records_to_grid(grid, records, sheet_id, base_id, table_id, options)
        }
        Direction::GridToRecords => {
            sync_grid_to_records(grid, records, sheet_id, base_id, table_id, options)
        }
    }
}

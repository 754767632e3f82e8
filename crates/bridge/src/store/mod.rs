//! Store trait definitions
//!
//! These traits abstract the two tabular stores behind their bulk
//! operations so the sync engine and orchestrator can run against either
//! the HTTP clients or the in-memory implementations used in tests.

mod memory;

pub use memory::{InMemoryGridStore, InMemoryRecordStore};

use crate::error::Result;
use crate::models::{FieldMap, Record};

/// A grid-addressed store (spreadsheet side).
///
/// Ranges are A1 notation, optionally tab-qualified. Reads return rows with
/// missing trailing cells absent, not null-padded.
pub trait GridStore: Send + Sync {
    /// Read a rectangular range as ordered rows of ordered cells.
    fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>>;

    /// Clear every cell in a range.
    fn clear_range(&self, spreadsheet_id: &str, range: &str) -> Result<()>;

    /// Overwrite a range with the given rows.
    fn update_range(&self, spreadsheet_id: &str, range: &str, rows: &[Vec<String>]) -> Result<()>;

    /// Append one row after the last data row of the ranged table.
    fn append_row(&self, spreadsheet_id: &str, range: &str, row: &[String]) -> Result<()>;
}

/// A record-table store (base/table side).
///
/// All three operations are sequential bulk primitives; implementations are
/// responsible for pagination, pacing, and deterministic ordering.
pub trait RecordStore: Send + Sync {
    /// List every record, sorted ascending by creation time. Listings past
    /// the implementation's page cap truncate silently.
    fn list_all(&self, base_id: &str, table_id: &str) -> Result<Vec<Record>>;

    /// Delete every record, one at a time. Any single failure aborts the
    /// whole operation. Returns the number deleted.
    fn delete_all(&self, base_id: &str, table_id: &str) -> Result<usize>;

    /// Create records one at a time in input order, so the store's default
    /// creation-time ordering matches the input. Returns the number created.
    fn create_sequential(
        &self,
        base_id: &str,
        table_id: &str,
        rows: &[FieldMap],
    ) -> Result<usize>;
}

impl<T: GridStore + ?Sized> GridStore for std::sync::Arc<T> {
    fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        (**self).get_values(spreadsheet_id, range)
    }

    fn clear_range(&self, spreadsheet_id: &str, range: &str) -> Result<()> {
        (**self).clear_range(spreadsheet_id, range)
    }

    fn update_range(&self, spreadsheet_id: &str, range: &str, rows: &[Vec<String>]) -> Result<()> {
        (**self).update_range(spreadsheet_id, range, rows)
    }

    fn append_row(&self, spreadsheet_id: &str, range: &str, row: &[String]) -> Result<()> {
        (**self).append_row(spreadsheet_id, range, row)
    }
}

impl<T: RecordStore + ?Sized> RecordStore for std::sync::Arc<T> {
    fn list_all(&self, base_id: &str, table_id: &str) -> Result<Vec<Record>> {
        (**self).list_all(base_id, table_id)
    }

    fn delete_all(&self, base_id: &str, table_id: &str) -> Result<usize> {
        (**self).delete_all(base_id, table_id)
    }

    fn create_sequential(&self, base_id: &str, table_id: &str, rows: &[FieldMap]) -> Result<usize> {
        (**self).create_sequential(base_id, table_id, rows)
    }
}

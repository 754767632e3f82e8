//! Field values and records from the record-table store.
//!
//! Bitable fields are loosely typed; they are modeled as a tagged variant at
//! the boundary so the projection onto a sheet header stays total. A single
//! stringification function is applied uniformly when cells are written.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An ordered field-name -> value mapping, as sent to record creation.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A record-table field value.
///
/// Variant order matters for untagged deserialization: scalars are tried
/// first, anything structured (arrays, objects, null) falls through to
/// [`FieldValue::Structured`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Structured(Value),
}

impl FieldValue {
    /// Stringify for a grid cell.
    ///
    /// Structured values serialize to canonical JSON; null and absent values
    /// become the empty string; whole numbers print without a fraction, the
    /// way the record store displays them.
    pub fn to_cell_string(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Structured(Value::Null) => String::new(),
            FieldValue::Structured(v) => v.to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A row of the record-table store.
///
/// The server-assigned creation timestamp exists only to establish a stable
/// ordering across paginated listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub record_id: String,
    /// Creation time in epoch milliseconds.
    #[serde(default)]
    pub created_time: i64,
    #[serde(default)]
    pub fields: FieldMap,
}

impl Record {
    pub fn new(record_id: impl Into<String>, created_time: i64, fields: FieldMap) -> Self {
        Self {
            record_id: record_id.into(),
            created_time,
            fields,
        }
    }
}

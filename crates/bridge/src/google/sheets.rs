//! Google Sheets values API client
//!
//! Implements the grid-store bulk operations against the v4 values
//! endpoints. A client is constructed per run from a short-lived access
//! token. All writes use USER_ENTERED interpretation, so formulas and types
//! are inferred from cell content the way a typing user's would be.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ureq::Agent;

use crate::error::Result;
use crate::store::GridStore;
use crate::sync::GridStoreFactory;

/// Response from reading a value range
#[derive(Debug, Deserialize)]
struct ValueRange {
    values: Option<Vec<Vec<Value>>>,
}

/// Request body for range updates and appends
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

/// Sheets API client scoped to one access token.
pub struct SheetsClient {
    access_token: String,
    agent: Agent,
    write_agent: Agent,
}

impl SheetsClient {
    /// Sheets values API base URL
    const BASE_URL: &'static str = "https://sheets.googleapis.com/v4/spreadsheets";

    pub fn new(access_token: impl Into<String>) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .build()
            .new_agent();
        // Range updates carry up to a full write chunk and get longer.
        let write_agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(45)))
            .build()
            .new_agent();
        Self {
            access_token: access_token.into(),
            agent,
            write_agent,
        }
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str, suffix: &str) -> String {
        format!(
            "{}/{}/values/{}{}",
            Self::BASE_URL,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range),
            suffix
        )
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Stringify one cell of a values response. The API returns strings for
/// ordinary cells; anything else is serialized compactly.
fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl GridStore for SheetsClient {
    fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(spreadsheet_id, range, "");
        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer())
            .call()?;

        let body: ValueRange = response.body_mut().read_json()?;
        Ok(body
            .values
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    fn clear_range(&self, spreadsheet_id: &str, range: &str) -> Result<()> {
        let url = self.values_url(spreadsheet_id, range, ":clear");
        self.agent
            .post(&url)
            .header("Authorization", &self.bearer())
            .send_json(serde_json::json!({}))?;
        Ok(())
    }

    fn update_range(&self, spreadsheet_id: &str, range: &str, rows: &[Vec<String>]) -> Result<()> {
        let url = self.values_url(spreadsheet_id, range, "?valueInputOption=USER_ENTERED");
        let body = ValueRangeBody {
            major_dimension: "ROWS",
            values: rows,
        };
        self.write_agent
            .put(&url)
            .header("Authorization", &self.bearer())
            .send_json(&body)?;
        Ok(())
    }

    fn append_row(&self, spreadsheet_id: &str, range: &str, row: &[String]) -> Result<()> {
        let url = self.values_url(
            spreadsheet_id,
            range,
            ":append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
        );
        let values = [row.to_vec()];
        let body = ValueRangeBody {
            major_dimension: "ROWS",
            values: &values,
        };
        self.agent
            .post(&url)
            .header("Authorization", &self.bearer())
            .send_json(&body)?;
        Ok(())
    }
}

/// Builds a [`SheetsClient`] per access token for the orchestrator.
pub struct SheetsFactory;

impl GridStoreFactory for SheetsFactory {
    fn for_token(&self, access_token: &str) -> Result<Box<dyn GridStore>> {
        Ok(Box::new(SheetsClient::new(access_token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_url_encodes_range() {
        let client = SheetsClient::new("tok");
        let url = client.values_url("sheet/1", "Pairs!A1:L20000", ":clear");
        assert_eq!(
            url,
            "https://sheets.googleapis.com/v4/spreadsheets/sheet%2F1/values/Pairs%21A1%3AL20000:clear"
        );
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(Value::String("x".into())), "x");
        assert_eq!(cell_to_string(Value::Null), "");
        assert_eq!(cell_to_string(serde_json::json!(3.5)), "3.5");
        assert_eq!(cell_to_string(serde_json::json!(true)), "true");
    }
}

//! Sheet service trait and the wire types it exchanges.
//!
//! Implementations can talk to the real spreadsheet API over HTTP or be mocked
//! for testing. Wire types follow the Sheets v4 JSON shapes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SheetServiceError;

/// How the service interprets written values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueInputOption {
    /// Values are parsed as if typed by a user (numbers stay numbers).
    UserEntered,
    /// Values are stored as literal text.
    Raw,
}

/// A rectangle of cell values addressed by an A1 range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default)]
    pub range: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_dimension: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

impl ValueRange {
    /// Cells as text; numbers and booleans use their JSON text form.
    pub fn string_rows(&self) -> Vec<Vec<String>> {
        self.values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect()
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One round-trip write covering many ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateRequest {
    pub value_input_option: ValueInputOption,
    pub data: Vec<ValueRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    #[serde(default)]
    pub updated_range: String,
    #[serde(default)]
    pub updated_cells: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateResponse {
    #[serde(default)]
    pub total_updated_cells: u64,
    #[serde(default)]
    pub responses: Vec<UpdateValuesResponse>,
}

/// The remote table: read everything, write in batches.
#[async_trait]
pub trait SheetService: Send + Sync {
    /// Read all values in `range` (e.g. `Sheet1!A:Z`), header row first.
    async fn get_values(&self, range: &str) -> Result<ValueRange, SheetServiceError>;

    /// Apply every range in `request` in a single call.
    async fn batch_update(
        &self,
        request: BatchUpdateRequest,
    ) -> Result<BatchUpdateResponse, SheetServiceError>;
}

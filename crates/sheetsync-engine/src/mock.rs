//! Mock sheet service for unit testing.
//!
//! Holds an in-memory table, records all calls, returns pre-configured
//! errors, and applies batch writes so tests can read back what was pushed.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::column::parse_range_start;
use crate::error::SheetServiceError;
use crate::service::{
    BatchUpdateRequest, BatchUpdateResponse, SheetService, UpdateValuesResponse, ValueRange,
};

/// A recorded call to the mock service.
#[derive(Debug, Clone)]
pub enum MockCall {
    GetValues(String),
    BatchUpdate(BatchUpdateRequest),
}

/// Mock implementation of [`SheetService`].
#[derive(Default)]
pub struct MockSheetService {
    table: Mutex<Vec<Vec<String>>>,
    calls: Mutex<Vec<MockCall>>,
    get_errors: Mutex<VecDeque<SheetServiceError>>,
    update_errors: Mutex<VecDeque<SheetServiceError>>,
    update_delay: Mutex<Option<Duration>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MockSheetService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table with a header row and data rows.
    pub fn with_table(self, header: &[&str], rows: &[&[&str]]) -> Self {
        self.set_table(header, rows);
        self
    }

    /// Queue an error for the next `get_values` call. Errors are consumed in order.
    pub fn with_get_error(self, err: SheetServiceError) -> Self {
        lock(&self.get_errors).push_back(err);
        self
    }

    /// Queue an error for the next `batch_update` call. Errors are consumed in order.
    pub fn with_update_error(self, err: SheetServiceError) -> Self {
        lock(&self.update_errors).push_back(err);
        self
    }

    /// Hold every `batch_update` for `delay` before answering.
    pub fn with_update_delay(self, delay: Duration) -> Self {
        *lock(&self.update_delay) = Some(delay);
        self
    }

    pub fn set_table(&self, header: &[&str], rows: &[&[&str]]) {
        let mut table = vec![header.iter().map(|s| s.to_string()).collect::<Vec<_>>()];
        table.extend(
            rows.iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect::<Vec<_>>()),
        );
        *lock(&self.table) = table;
    }

    pub fn push_get_error(&self, err: SheetServiceError) {
        lock(&self.get_errors).push_back(err);
    }

    pub fn push_update_error(&self, err: SheetServiceError) {
        lock(&self.update_errors).push_back(err);
    }

    /// Cell text at 1-based `row`, 0-based `col`; `None` outside the table.
    pub fn cell(&self, row: u32, col: usize) -> Option<String> {
        let table = lock(&self.table);
        let r = usize::try_from(row).ok()?.checked_sub(1)?;
        table.get(r)?.get(col).cloned()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Every batch request received, in order.
    pub fn batch_requests(&self) -> Vec<BatchUpdateRequest> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                MockCall::BatchUpdate(req) => Some(req.clone()),
                MockCall::GetValues(_) => None,
            })
            .collect()
    }

    pub fn get_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, MockCall::GetValues(_)))
            .count()
    }

    fn record(&self, call: MockCall) {
        lock(&self.calls).push(call);
    }

    fn write_range(&self, range: &ValueRange) -> Result<u64, SheetServiceError> {
        let bad_range = || SheetServiceError::Http {
            status: 400,
            message: format!("Unable to parse range: {}", range.range),
        };
        let (first_col, row) = parse_range_start(&range.range).ok_or_else(bad_range)?;
        let first_row = (row as usize).checked_sub(1).ok_or_else(bad_range)?;
        let mut table = lock(&self.table);
        let mut cells = 0u64;
        for (offset, values) in range.values.iter().enumerate() {
            let r = first_row + offset;
            if table.len() <= r {
                table.resize(r + 1, Vec::new());
            }
            let target = &mut table[r];
            for (i, value) in values.iter().enumerate() {
                let c = first_col + i;
                if target.len() <= c {
                    target.resize(c + 1, String::new());
                }
                target[c] = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                cells += 1;
            }
        }
        Ok(cells)
    }
}

#[async_trait]
impl SheetService for MockSheetService {
    async fn get_values(&self, range: &str) -> Result<ValueRange, SheetServiceError> {
        self.record(MockCall::GetValues(range.to_string()));
        if let Some(err) = lock(&self.get_errors).pop_front() {
            return Err(err);
        }
        let values = lock(&self.table)
            .iter()
            .map(|row| {
                row.iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect()
            })
            .collect();
        Ok(ValueRange {
            range: range.to_string(),
            major_dimension: Some("ROWS".into()),
            values,
        })
    }

    async fn batch_update(
        &self,
        request: BatchUpdateRequest,
    ) -> Result<BatchUpdateResponse, SheetServiceError> {
        self.record(MockCall::BatchUpdate(request.clone()));
        let delay = *lock(&self.update_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = lock(&self.update_errors).pop_front() {
            return Err(err);
        }

        let mut response = BatchUpdateResponse::default();
        for range in &request.data {
            let cells = self.write_range(range)?;
            response.total_updated_cells += cells;
            response.responses.push(UpdateValuesResponse {
                updated_range: range.range.clone(),
                updated_cells: cells,
            });
        }
        Ok(response)
    }
}

//! Batch push: turn pending field edits into one addressed batch write, and
//! fold a successful write back into record state.

use tracing::{debug, warn};

use crate::column::row_range;
use crate::error::SyncError;
use crate::header::HeaderMapping;
use crate::pending::PendingChangeSet;
use crate::service::{BatchUpdateRequest, ValueInputOption, ValueRange};
use crate::tracker::MutationTracker;
use crate::types::{Bounds, Field, FieldValue, Record};

/// Column used for X when the header row has none (B).
pub const DEFAULT_X_COLUMN: usize = 1;
/// Column used for Y when the header row has none (C).
pub const DEFAULT_Y_COLUMN: usize = 2;

/// Values sent for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordWrite {
    pub record_id: String,
    pub row_number: u32,
    pub sent: Vec<(Field, FieldValue)>,
    /// Modified fields with no destination column, with their value at
    /// planning time. Settled locally when the write succeeds.
    pub dropped: Vec<(Field, FieldValue)>,
}

/// Everything needed to issue the write and apply its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct PushPlan {
    pub request: BatchUpdateRequest,
    pub writes: Vec<RecordWrite>,
    /// Pending records left out because they failed bounds validation.
    pub excluded_ids: Vec<String>,
    /// Modified fields with no destination column.
    pub dropped: Vec<(String, Field)>,
}

impl PushPlan {
    pub fn record_ids(&self) -> Vec<String> {
        self.writes.iter().map(|w| w.record_id.clone()).collect()
    }

    pub fn range_count(&self) -> usize {
        self.request.data.len()
    }
}

/// Destination column for `field`: the header binding, else the spatial
/// default when that column is not bound to another field.
pub fn resolve_column(mapping: &HeaderMapping, field: Field) -> Option<usize> {
    if let Some(col) = mapping.column(field) {
        return Some(col);
    }
    let fallback = match field {
        Field::X => DEFAULT_X_COLUMN,
        Field::Y => DEFAULT_Y_COLUMN,
        _ => return None,
    };
    if mapping.iter().any(|(_, col)| col == fallback) {
        return None;
    }
    Some(fallback)
}

/// Build the single batch request covering every valid pending record.
pub fn build_push_plan(
    records: &[Record],
    pending: &PendingChangeSet,
    mapping: &HeaderMapping,
    bounds: &Bounds,
    sheet_name: &str,
) -> Result<PushPlan, SyncError> {
    if pending.is_empty() {
        return Err(SyncError::no_pending_changes());
    }
    let candidates: Vec<&Record> = records
        .iter()
        .filter(|r| r.is_modified() && pending.contains(&r.id))
        .collect();
    if candidates.is_empty() {
        return Err(SyncError::no_pending_changes());
    }

    let (valid, invalid): (Vec<&Record>, Vec<&Record>) =
        candidates.into_iter().partition(|r| r.in_bounds(bounds));
    let excluded_ids: Vec<String> = invalid.iter().map(|r| r.id.clone()).collect();
    for r in &invalid {
        warn!(record_id = %r.id, x = r.x, y = r.y, "record out of bounds, excluded from push");
    }
    if valid.is_empty() {
        return Err(SyncError::all_records_invalid(excluded_ids));
    }

    let mut data = Vec::new();
    let mut writes = Vec::new();
    let mut dropped = Vec::new();
    for record in valid {
        let mut cells: Vec<(usize, Field, FieldValue)> = Vec::new();
        let mut unsent = Vec::new();
        for &field in &record.modified_fields {
            match resolve_column(mapping, field) {
                Some(col) if cells.iter().all(|(c, _, _)| *c != col) => {
                    cells.push((col, field, record.get(field)));
                }
                _ => {
                    warn!(record_id = %record.id, field = %field, "no destination column, field not pushed");
                    dropped.push((record.id.clone(), field));
                    unsent.push((field, record.get(field)));
                }
            }
        }
        cells.sort_by_key(|(col, _, _)| *col);

        for segment in contiguous_segments(&cells) {
            let (first, last) = (segment[0].0, segment[segment.len() - 1].0);
            let range = row_range(sheet_name, first, last, record.row_number);
            debug!(record_id = %record.id, %range, "queued range");
            data.push(ValueRange {
                range,
                major_dimension: None,
                values: vec![segment.iter().map(|(_, _, v)| v.to_json()).collect()],
            });
        }
        writes.push(RecordWrite {
            record_id: record.id.clone(),
            row_number: record.row_number,
            sent: cells.into_iter().map(|(_, f, v)| (f, v)).collect(),
            dropped: unsent,
        });
    }

    if data.is_empty() {
        let mut ids: Vec<String> = dropped.iter().map(|(id, _)| id.clone()).collect();
        ids.dedup();
        return Err(SyncError::nothing_writable(ids));
    }

    Ok(PushPlan {
        request: BatchUpdateRequest {
            value_input_option: ValueInputOption::UserEntered,
            data,
        },
        writes,
        excluded_ids,
        dropped,
    })
}

/// Split column-sorted cells into runs of adjacent columns.
fn contiguous_segments<T>(cells: &[(usize, Field, T)]) -> Vec<&[(usize, Field, T)]> {
    let mut segments = Vec::new();
    if cells.is_empty() {
        return segments;
    }
    let mut start = 0;
    for i in 1..=cells.len() {
        if i == cells.len() || cells[i].0 != cells[i - 1].0 + 1 {
            segments.push(&cells[start..i]);
            start = i;
        }
    }
    segments
}

/// Fold a successful write into record state. The sent value becomes the
/// original; a field whose local value no longer matches it (edited or
/// reverted while the write was in flight) stays modified. Dropped fields are
/// settled the same way against their planning-time value. Returns ids that
/// are now clean.
pub fn apply_push_success(
    records: &mut [Record],
    plan: &PushPlan,
    tracker: &MutationTracker,
) -> Vec<String> {
    let mut cleaned = Vec::new();
    for write in &plan.writes {
        let Some(record) = records.iter_mut().find(|r| r.id == write.record_id) else {
            continue;
        };
        for (field, sent) in write.sent.iter().chain(&write.dropped) {
            record.original_values.insert(*field, sent.clone());
            if record.get(*field) == *sent {
                record.modified_fields.remove(field);
            } else {
                tracker.mark_field_modified(record, *field);
            }
        }
        if !record.is_modified() {
            tracker.clear(&record.id);
            cleaned.push(record.id.clone());
        }
    }
    cleaned
}

/// Drop pending ids that have nothing left to push: the record is gone from
/// the cache or carries no modified field. Returns the ids removed.
pub fn prune_stale_pending(records: &[Record], tracker: &MutationTracker) -> Vec<String> {
    let stale: Vec<String> = tracker
        .pending()
        .ids()
        .into_iter()
        .filter(|id| !records.iter().any(|r| &r.id == id && r.is_modified()))
        .collect();
    for id in &stale {
        debug!(record_id = %id, "pruning stale pending id");
        tracker.clear(id);
    }
    stale
}

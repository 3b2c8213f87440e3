//! Row -> [`Record`] conversion with clamping and default coercion.

use tracing::warn;

use crate::header::HeaderMapping;
use crate::types::{Bounds, Field, Record, RATING_MAX, RATING_MIN};

/// Tokens accepted as `true` for boolean columns (compared case-insensitively).
pub const TRUTHY_TOKENS: [&str; 3] = ["true", "yes", "1"];

/// Result of parsing every data row of a table.
#[derive(Debug, Clone, Default)]
pub struct ParsedTable {
    pub records: Vec<Record>,
    /// Sheet row numbers that were skipped.
    pub rejected_rows: Vec<u32>,
}

/// Sheet row number for the 0-based data row `index` (row 1 is the header).
pub fn row_number_for_index(index: usize) -> u32 {
    u32::try_from(index).map_or(u32::MAX, |i| i.saturating_add(2))
}

/// Parse one data row. Returns `None` when the label is blank.
pub fn parse_row<S: AsRef<str>>(
    row: &[S],
    index: usize,
    mapping: &HeaderMapping,
    bounds: &Bounds,
) -> Option<Record> {
    let row_number = row_number_for_index(index);
    let cell = |field: Field| {
        mapping
            .column(field)
            .and_then(|col| row.get(col))
            .map(|v| v.as_ref().trim())
            .filter(|v| !v.is_empty())
    };

    let title = match cell(Field::Title) {
        Some(t) => t.to_string(),
        None => {
            warn!(row = row_number, "skipping row with blank title");
            return None;
        }
    };

    let mut record = Record::new(row_number, title);
    record.session_date = cell(Field::SessionDate).map(str::to_string);
    record.details = cell(Field::Details).map(str::to_string);
    record.location = cell(Field::Location).map(str::to_string);
    record.location_targeted = cell(Field::LocationTargeted).map(str::to_string);
    record.resolved = cell(Field::Resolved).is_some_and(is_truthy);

    match (
        cell(Field::X).and_then(parse_number),
        cell(Field::Y).and_then(parse_number),
    ) {
        (Some(x), Some(y)) => {
            record.x = clamp_logged(row_number, Field::X, x, bounds.clamp_x(x));
            record.y = clamp_logged(row_number, Field::Y, y, bounds.clamp_y(y));
        }
        _ => {
            // Left at the origin for auto-placement.
            record.x = 0.0;
            record.y = 0.0;
        }
    }

    record.rating = cell(Field::Rating)
        .and_then(parse_number)
        .map(|r| clamp_logged(row_number, Field::Rating, r, r.clamp(RATING_MIN, RATING_MAX)));

    record.snapshot_originals();
    Some(record)
}

/// Parse all data rows, skipping rejected ones.
pub fn parse_rows<R, S>(rows: &[R], mapping: &HeaderMapping, bounds: &Bounds) -> ParsedTable
where
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    let mut table = ParsedTable::default();
    for (index, row) in rows.iter().enumerate() {
        match parse_row(row.as_ref(), index, mapping, bounds) {
            Some(record) => table.records.push(record),
            None => table.rejected_rows.push(row_number_for_index(index)),
        }
    }
    table
}

pub fn is_truthy(raw: &str) -> bool {
    let v = raw.trim();
    TRUTHY_TOKENS.iter().any(|t| t.eq_ignore_ascii_case(v))
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn clamp_logged(row: u32, field: Field, raw: f64, clamped: f64) -> f64 {
    if clamped != raw {
        warn!(row, field = %field, raw, clamped, "value out of range, clamped");
    }
    clamped
}

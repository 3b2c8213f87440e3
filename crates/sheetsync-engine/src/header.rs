//! Header row -> logical field column bindings.

use std::collections::BTreeMap;

use tracing::debug;

use crate::types::Field;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("table has no header row")]
    Empty,
    #[error("required column {field:?} not found in header row")]
    MissingRequired { field: Field },
}

/// Field -> 0-based column index, built once per fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderMapping {
    columns: BTreeMap<Field, usize>,
}

impl HeaderMapping {
    /// Bind each field to the first column whose normalized header matches one
    /// of its aliases. Unknown columns are ignored.
    pub fn from_header_row<S: AsRef<str>>(row: &[S]) -> Result<Self, HeaderError> {
        if row.iter().all(|h| h.as_ref().trim().is_empty()) {
            return Err(HeaderError::Empty);
        }

        let normalized: Vec<String> = row.iter().map(|h| normalize_header(h.as_ref())).collect();
        let mut columns = BTreeMap::new();
        for field in Field::ALL {
            let aliases = field.aliases();
            if let Some(index) = normalized.iter().position(|h| aliases.contains(&h.as_str())) {
                debug!(field = %field, column = index, "bound header column");
                columns.insert(field, index);
            }
        }

        if let Some(field) = Field::ALL
            .into_iter()
            .find(|f| f.is_required() && !columns.contains_key(f))
        {
            return Err(HeaderError::MissingRequired { field });
        }

        Ok(Self { columns })
    }

    pub fn column(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    /// Bindings in field order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, usize)> + '_ {
        self.columns.iter().map(|(f, i)| (*f, *i))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Trim, lowercase, and collapse inner whitespace runs.
pub fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

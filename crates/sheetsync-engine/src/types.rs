//! Record domain model: logical fields, scalar values, spatial bounds.

use std::collections::{BTreeMap, BTreeSet};

use sheetsync_core::config::BoundsConfig;

/// Inclusive lower/upper rating bounds.
pub const RATING_MIN: f64 = 0.0;
pub const RATING_MAX: f64 = 5.0;

/// Logical business field of a record, independent of sheet column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Title,
    SessionDate,
    X,
    Y,
    Rating,
    Resolved,
    Details,
    Location,
    LocationTargeted,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Title,
        Field::SessionDate,
        Field::X,
        Field::Y,
        Field::Rating,
        Field::Resolved,
        Field::Details,
        Field::Location,
        Field::LocationTargeted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::SessionDate => "session_date",
            Self::X => "x",
            Self::Y => "y",
            Self::Rating => "rating",
            Self::Resolved => "resolved",
            Self::Details => "details",
            Self::Location => "location",
            Self::LocationTargeted => "location_targeted",
        }
    }

    /// Header spellings accepted for this field, already normalized.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Title => &["title", "name", "label"],
            Self::SessionDate => &["session_date", "session date", "date"],
            Self::X => &["x", "x coordinate", "x_coordinate"],
            Self::Y => &["y", "y coordinate", "y_coordinate"],
            Self::Rating => &["rating", "score"],
            Self::Resolved => &["resolved", "is resolved", "done"],
            Self::Details => &["details", "description", "notes"],
            Self::Location => &["location", "current location"],
            Self::LocationTargeted => &[
                "location targetted",
                "location targeted",
                "location_targeted",
                "target location",
            ],
        }
    }

    /// A sheet without a column for a required field cannot be parsed.
    pub fn is_required(self) -> bool {
        matches!(self, Self::Title)
    }

    pub fn is_spatial(self) -> bool {
        matches!(self, Self::X | Self::Y)
    }

    /// Parse a field from its canonical name or any header alias.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == needle || f.aliases().contains(&needle.as_str()))
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl FieldValue {
    fn from_opt_text(v: &Option<String>) -> Self {
        match v {
            Some(s) => Self::Text(s.clone()),
            None => Self::Null,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
        }
    }

    /// JSON cell value for a `USER_ENTERED` write. Null clears the cell.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::String(String::new()),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or_else(|| serde_json::Value::String(n.to_string()))
                }
            }
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldValueError {
    #[error("field {field} does not accept a {kind} value")]
    TypeMismatch { field: Field, kind: &'static str },
    #[error("field {field} requires a finite number")]
    NotFinite { field: Field },
    #[error("field {field} must not be blank")]
    Blank { field: Field },
}

/// Spatial bounding rectangle anchored at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::from(&BoundsConfig::default())
    }
}

impl From<&BoundsConfig> for Bounds {
    fn from(cfg: &BoundsConfig) -> Self {
        Self {
            max_x: cfg.max_x,
            max_y: cfg.max_y,
        }
    }
}

impl Bounds {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..=self.max_x).contains(&x) && (0.0..=self.max_y).contains(&y)
    }

    pub fn clamp_x(&self, x: f64) -> f64 {
        x.clamp(0.0, self.max_x)
    }

    pub fn clamp_y(&self, y: f64) -> f64 {
        y.clamp(0.0, self.max_y)
    }
}

/// One synchronizable row of the remote table.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    /// 1-based sheet row; the header is row 1.
    pub row_number: u32,
    pub title: String,
    pub session_date: Option<String>,
    pub x: f64,
    pub y: f64,
    pub rating: Option<f64>,
    pub resolved: bool,
    pub details: Option<String>,
    pub location: Option<String>,
    pub location_targeted: Option<String>,
    pub modified_fields: BTreeSet<Field>,
    pub original_values: BTreeMap<Field, FieldValue>,
}

impl Record {
    /// A record with only identity and label set, at the origin.
    pub fn new(row_number: u32, title: impl Into<String>) -> Self {
        Self {
            id: record_id_for_row(row_number),
            row_number,
            title: title.into(),
            session_date: None,
            x: 0.0,
            y: 0.0,
            rating: None,
            resolved: false,
            details: None,
            location: None,
            location_targeted: None,
            modified_fields: BTreeSet::new(),
            original_values: BTreeMap::new(),
        }
    }

    pub fn is_modified(&self) -> bool {
        !self.modified_fields.is_empty()
    }

    pub fn get(&self, field: Field) -> FieldValue {
        match field {
            Field::Title => FieldValue::Text(self.title.clone()),
            Field::SessionDate => FieldValue::from_opt_text(&self.session_date),
            Field::X => FieldValue::Number(self.x),
            Field::Y => FieldValue::Number(self.y),
            Field::Rating => self.rating.map_or(FieldValue::Null, FieldValue::Number),
            Field::Resolved => FieldValue::Bool(self.resolved),
            Field::Details => FieldValue::from_opt_text(&self.details),
            Field::Location => FieldValue::from_opt_text(&self.location),
            Field::LocationTargeted => FieldValue::from_opt_text(&self.location_targeted),
        }
    }

    /// Write a value, type-checked against the field. Does not track the change.
    pub fn set(&mut self, field: Field, value: FieldValue) -> Result<(), FieldValueError> {
        let mismatch = |value: &FieldValue| FieldValueError::TypeMismatch {
            field,
            kind: value.kind(),
        };
        match (field, value) {
            (Field::Title, FieldValue::Text(s)) => {
                if s.trim().is_empty() {
                    return Err(FieldValueError::Blank { field });
                }
                self.title = s;
            }
            (Field::X | Field::Y | Field::Rating, FieldValue::Number(n)) if !n.is_finite() => {
                return Err(FieldValueError::NotFinite { field });
            }
            (Field::X, FieldValue::Number(n)) => self.x = n,
            (Field::Y, FieldValue::Number(n)) => self.y = n,
            (Field::Rating, FieldValue::Number(n)) => self.rating = Some(n),
            (Field::Rating, FieldValue::Null) => self.rating = None,
            (Field::Resolved, FieldValue::Bool(b)) => self.resolved = b,
            (Field::SessionDate, v) => self.session_date = optional_text(field, v)?,
            (Field::Details, v) => self.details = optional_text(field, v)?,
            (Field::Location, v) => self.location = optional_text(field, v)?,
            (Field::LocationTargeted, v) => self.location_targeted = optional_text(field, v)?,
            (_, v) => return Err(mismatch(&v)),
        }
        Ok(())
    }

    /// Copy every field's current value into `original_values`.
    pub fn snapshot_originals(&mut self) {
        self.original_values = Field::ALL.into_iter().map(|f| (f, self.get(f))).collect();
    }

    /// Still at the sentinel origin (no usable coordinates).
    pub fn is_at_origin(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn in_bounds(&self, bounds: &Bounds) -> bool {
        bounds.contains(self.x, self.y)
    }

    /// Key used to share coordinates between records aimed at the same place.
    pub fn target_location_key(&self) -> Option<&str> {
        self.location_targeted
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn optional_text(field: Field, value: FieldValue) -> Result<Option<String>, FieldValueError> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Text(s) => Ok(Some(s)),
        other => Err(FieldValueError::TypeMismatch {
            field,
            kind: other.kind(),
        }),
    }
}

/// Stable id for the record read from `row_number`.
pub fn record_id_for_row(row_number: u32) -> String {
    format!("row-{row_number}")
}

//! Normalized error types.
//!
//! [`SheetServiceError`] is what a transport reports; [`SyncError`] is the
//! closed taxonomy every fetch/push failure ends in, carrying retryability and
//! a user-facing message.

use crate::types::Field;

/// Transport-level failure from a [`crate::service::SheetService`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SheetServiceError {
    /// The service answered with a non-success status.
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection could not be established or was dropped.
    #[error("network unavailable: {message}")]
    Network { message: String },

    /// The transport gave up waiting for a response.
    #[error("request timed out: {message}")]
    Timeout { message: String },

    /// A response arrived but could not be decoded.
    #[error("decode response: {message}")]
    Decode { message: String },

    /// The request could not be built (bad base URL, missing spreadsheet id).
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

/// Failure category. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncErrorKind {
    Validation,
    Auth,
    Permission,
    RateLimit,
    Configuration,
    Network,
    Unknown,
}

impl SyncErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Auth => "auth",
            Self::Permission => "permission",
            Self::RateLimit => "rate_limit",
            Self::Configuration => "configuration",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }

    /// Default retryability for the kind.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Auth | Self::RateLimit | Self::Network | Self::Unknown
        )
    }

    fn user_message(self) -> &'static str {
        match self {
            Self::Validation => "Some changes could not be saved because they are invalid.",
            Self::Auth => "Your session has expired. Sign in again and retry.",
            Self::Permission => "You do not have permission to edit this sheet.",
            Self::RateLimit => "The sheet service is busy. Your changes are kept; try again shortly.",
            Self::Configuration => "The sheet is not set up as expected. Check the sheet name and headers.",
            Self::Network => "You appear to be offline. Your changes are kept; retry when connected.",
            Self::Unknown => "Something went wrong while syncing. Your changes are kept; try again.",
        }
    }
}

impl std::fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified fetch/push failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {technical_message}")]
pub struct SyncError {
    pub kind: SyncErrorKind,
    pub technical_message: String,
    pub user_message: String,
    pub retryable: bool,
    pub http_status: Option<u16>,
    pub failed_record_ids: Vec<String>,
}

impl SyncError {
    pub fn new(kind: SyncErrorKind, technical_message: impl Into<String>) -> Self {
        Self {
            kind,
            technical_message: technical_message.into(),
            user_message: kind.user_message().to_string(),
            retryable: kind.is_retryable(),
            http_status: None,
            failed_record_ids: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_failed_records(mut self, ids: Vec<String>) -> Self {
        self.failed_record_ids = ids;
        self
    }

    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = message.into();
        self
    }

    pub fn no_pending_changes() -> Self {
        Self::new(SyncErrorKind::Validation, "no pending changes to push")
            .with_user_message("There are no changes to save.")
    }

    pub fn all_records_invalid(ids: Vec<String>) -> Self {
        Self::new(
            SyncErrorKind::Validation,
            format!("all {} pending records are out of bounds", ids.len()),
        )
        .with_user_message("None of the changes could be saved: positions are outside the map.")
        .with_failed_records(ids)
    }

    /// Some records were excluded from an otherwise successful push.
    pub fn partial_failure(ids: Vec<String>) -> Self {
        Self::new(
            SyncErrorKind::Validation,
            format!("{} records excluded from push: out of bounds", ids.len()),
        )
        .with_user_message("Some changes were not saved because their positions are outside the map.")
        .with_failed_records(ids)
    }

    /// Pending records exist but none of their fields maps to a column.
    pub fn nothing_writable(ids: Vec<String>) -> Self {
        Self::new(
            SyncErrorKind::Configuration,
            "no modified field resolves to a sheet column",
        )
        .with_failed_records(ids)
    }

    pub fn missing_required_header(field: Field) -> Self {
        Self::new(
            SyncErrorKind::Configuration,
            format!("required column {field:?} missing from header row"),
        )
    }

    pub fn not_loaded() -> Self {
        Self::new(
            SyncErrorKind::Configuration,
            "no table has been fetched yet; header mapping unavailable",
        )
    }

    pub fn unknown_record(record_id: &str) -> Self {
        Self::new(
            SyncErrorKind::Validation,
            format!("record {record_id:?} not found"),
        )
    }

    /// Single-writer refusal: another fetch or push is still in flight.
    pub fn operation_in_progress(operation: &str) -> Self {
        let mut err = Self::new(
            SyncErrorKind::Validation,
            format!("{operation} already in progress"),
        )
        .with_user_message("A sync is already running. Try again when it finishes.");
        err.retryable = true;
        err
    }
}

/// Map a transport failure to the sync taxonomy. Only the status code drives
/// HTTP classification; unmapped statuses are `unknown` and retryable.
pub fn classify(err: &SheetServiceError) -> SyncError {
    match err {
        SheetServiceError::Http { status, .. } => {
            let kind = match status {
                400 => SyncErrorKind::Configuration,
                401 => SyncErrorKind::Auth,
                403 => SyncErrorKind::Permission,
                429 => SyncErrorKind::RateLimit,
                _ => SyncErrorKind::Unknown,
            };
            SyncError::new(kind, err.to_string()).with_status(*status)
        }
        SheetServiceError::Network { .. } | SheetServiceError::Timeout { .. } => {
            SyncError::new(SyncErrorKind::Network, err.to_string())
        }
        SheetServiceError::Decode { .. } => SyncError::new(SyncErrorKind::Unknown, err.to_string()),
        SheetServiceError::InvalidRequest { .. } => {
            SyncError::new(SyncErrorKind::Configuration, err.to_string())
        }
    }
}

impl From<SheetServiceError> for SyncError {
    fn from(err: SheetServiceError) -> Self {
        classify(&err)
    }
}

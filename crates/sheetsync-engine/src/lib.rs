//! sheetsync-engine: keeps an in-memory record set in step with a remote
//! spreadsheet table.
//!
//! Provides the `SyncEngine` facade over a transport-agnostic `SheetService`:
//! - `HttpSheetService`: reqwest-backed Sheets v4 transport
//! - `MockSheetService`: in-memory table for unit testing
//!
//! Each fetch and push reports a `SyncEvent` through the `SyncEventSink` trait.

pub mod cache;
pub mod column;
pub mod engine;
pub mod error;
pub mod event;
pub mod header;
pub mod http;
pub mod mock;
pub mod parser;
pub mod pending;
pub mod placement;
pub mod push;
pub mod retry;
pub mod service;
pub mod tracker;
pub mod types;

pub use engine::{DiscardConfirmation, EngineOptions, FetchOutcome, PushReport, SyncEngine, SyncStatus};
pub use error::{SheetServiceError, SyncError, SyncErrorKind};
pub use types::{Bounds, Field, FieldValue, Record};

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "sheetsync-engine"
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn crate_label_is_stable() {
        assert_eq!(crate_label(), "sheetsync-engine");
    }
}

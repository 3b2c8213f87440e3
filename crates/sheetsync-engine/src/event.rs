//! Sync event recording for audit and debugging.
//!
//! Every fetch and push reports its outcome to a [`SyncEventSink`].

use chrono::{DateTime, Utc};
use tracing::{error, info};

/// The engine operation that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEventKind {
    Fetch,
    CacheHit,
    Push,
    Revert,
}

impl std::fmt::Display for SyncEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Fetch => "fetch",
            Self::CacheHit => "cache_hit",
            Self::Push => "push",
            Self::Revert => "revert",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEventOutcome {
    Success,
    /// The user declined to discard pending edits.
    Aborted,
    Error(String),
}

impl std::fmt::Display for SyncEventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Aborted => f.write_str("aborted"),
            Self::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: SyncEventKind,
    pub outcome: SyncEventOutcome,
    pub record_ids: Vec<String>,
    pub detail: String,
}

impl SyncEvent {
    pub fn new(
        kind: SyncEventKind,
        outcome: SyncEventOutcome,
        record_ids: Vec<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            outcome,
            record_ids,
            detail: detail.into(),
        }
    }
}

pub trait SyncEventSink: Send + Sync {
    fn record(&self, event: SyncEvent);
}

/// In-memory event sink for testing.
#[derive(Default)]
pub struct InMemoryEventSink {
    events: std::sync::Mutex<Vec<SyncEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self) -> usize {
        match self.events.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn of_kind(&self, kind: SyncEventKind) -> Vec<SyncEvent> {
        self.events().into_iter().filter(|e| e.kind == kind).collect()
    }
}

impl SyncEventSink for InMemoryEventSink {
    fn record(&self, event: SyncEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// No-op event sink that discards all events.
pub struct NullEventSink;

impl SyncEventSink for NullEventSink {
    fn record(&self, _event: SyncEvent) {}
}

/// Forwards events to `tracing`.
pub struct TracingEventSink;

impl SyncEventSink for TracingEventSink {
    fn record(&self, event: SyncEvent) {
        match &event.outcome {
            SyncEventOutcome::Error(msg) => error!(
                kind = %event.kind,
                records = event.record_ids.len(),
                error = %msg,
                "{}",
                event.detail
            ),
            outcome => info!(
                kind = %event.kind,
                outcome = %outcome,
                records = event.record_ids.len(),
                "{}",
                event.detail
            ),
        }
    }
}

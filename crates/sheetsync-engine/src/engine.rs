//! Sync engine facade.
//!
//! Owns the cached record set and the mutation tracker, drives fetch and push
//! against a [`SheetService`], and publishes [`SyncStatus`] to every observer.
//! Fetch and push share one busy flag, so at most one of them runs at a time.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sheetsync_core::config::Config;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::cache::{Clock, RecordCache, SystemClock};
use crate::column::quote_sheet_name;
use crate::error::{SyncError, SyncErrorKind};
use crate::event::{NullEventSink, SyncEvent, SyncEventKind, SyncEventOutcome, SyncEventSink};
use crate::header::{HeaderError, HeaderMapping};
use crate::http::{HttpSheetConfig, HttpSheetService};
use crate::parser::parse_rows;
use crate::pending::PendingChangeSet;
use crate::placement::infer_placements;
use crate::push::{apply_push_success, build_push_plan, prune_stale_pending};
use crate::retry::RetryPolicy;
use crate::service::SheetService;
use crate::tracker::MutationTracker;
use crate::types::{Bounds, Field, FieldValue, Record};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub sheet_name: String,
    /// Column span read on fetch, e.g. `A:Z`.
    pub data_range: String,
    pub bounds: Bounds,
    pub ttl: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for EngineOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            sheet_name: cfg.sheet.sheet_name.clone(),
            data_range: cfg.sheet.data_range.clone(),
            bounds: Bounds::from(&cfg.bounds),
            ttl: cfg.cache.ttl(),
        }
    }
}

impl EngineOptions {
    /// Range requested on fetch: `Sheet1!A:Z`.
    pub fn read_range(&self) -> String {
        format!("{}!{}", quote_sheet_name(&self.sheet_name), self.data_range)
    }
}

// ---------------------------------------------------------------------------
// Status and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Fetch,
    Push,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Push => "push",
        }
    }
}

/// Observable engine state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStatus {
    pub is_fetching: bool,
    pub is_pushing: bool,
    pub last_push_error: Option<SyncError>,
    pub last_push_time: Option<DateTime<Utc>>,
    pub last_fetch_error: Option<SyncError>,
    pub last_fetch_time: Option<DateTime<Utc>>,
    pub pending_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Served from a fresh cache; no network call.
    Cached { records: Vec<Record> },
    Fetched {
        records: Vec<Record>,
        /// Records auto-placed from a sibling.
        placed: usize,
        /// Sheet rows skipped by the parser.
        rejected_rows: Vec<u32>,
    },
    /// The caller declined to discard pending edits. Nothing changed.
    Aborted,
}

impl FetchOutcome {
    pub fn records(&self) -> &[Record] {
        match self {
            Self::Cached { records } | Self::Fetched { records, .. } => records,
            Self::Aborted => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushReport {
    /// Records included in the write.
    pub pushed_ids: Vec<String>,
    /// Pushed records with no modified field left.
    pub cleaned_ids: Vec<String>,
    pub ranges: Vec<String>,
    pub updated_cells: u64,
    /// Set when some pending records were excluded from the write.
    pub partial_failure: Option<SyncError>,
}

/// Asked before a fetch would throw away pending edits.
pub trait DiscardConfirmation: Sync {
    fn confirm_discard(&self, pending_count: usize) -> bool;
}

impl<F> DiscardConfirmation for F
where
    F: Fn(usize) -> bool + Sync,
{
    fn confirm_discard(&self, pending_count: usize) -> bool {
        self(pending_count)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SyncEngine {
    service: Arc<dyn SheetService>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn SyncEventSink>,
    tracker: MutationTracker,
    options: EngineOptions,
    cache: Mutex<RecordCache>,
    busy: Mutex<Option<Operation>>,
    status: watch::Sender<SyncStatus>,
}

/// Clears the busy flag when the operation ends, however it ends.
struct BusyGuard<'a> {
    engine: &'a SyncEngine,
    operation: Operation,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.engine.busy) = None;
        let operation = self.operation;
        self.engine.update_status(|s| match operation {
            Operation::Fetch => s.is_fetching = false,
            Operation::Push => s.is_pushing = false,
        });
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl SyncEngine {
    pub fn new(service: Arc<dyn SheetService>, options: EngineOptions) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        Self {
            service,
            clock: Arc::new(SystemClock),
            events: Arc::new(NullEventSink),
            tracker: MutationTracker::default(),
            cache: Mutex::new(RecordCache::new(options.ttl)),
            options,
            busy: Mutex::new(None),
            status,
        }
    }

    /// Engine over the HTTP transport described by `cfg`.
    pub fn connect(cfg: &Config) -> Result<Self, SyncError> {
        let service = HttpSheetService::new(HttpSheetConfig::from(cfg))?;
        Ok(Self::new(Arc::new(service), EngineOptions::from(cfg)))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn SyncEventSink>) -> Self {
        self.events = events;
        self
    }

    /// Share the process-wide pending set instead of a private one.
    pub fn with_pending(mut self, pending: PendingChangeSet) -> Self {
        self.tracker = MutationTracker::new(pending);
        self.publish_pending();
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn pending(&self) -> PendingChangeSet {
        self.tracker.pending().clone()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.tracker.has_pending_changes()
    }

    pub fn pending_count(&self) -> usize {
        self.tracker.pending_count()
    }

    pub fn status(&self) -> SyncStatus {
        let mut status = self.status.borrow().clone();
        status.pending_count = self.pending_count();
        status
    }

    /// Status updates. `pending_count` here follows this engine's own edits and
    /// syncs; when the pending set is shared, use [`Self::subscribe_pending`] or
    /// [`Self::status`] for the live count.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Live size of the pending set, including writers outside this engine.
    pub fn subscribe_pending(&self) -> watch::Receiver<usize> {
        self.tracker.pending().subscribe()
    }

    pub fn records(&self) -> Vec<Record> {
        lock(&self.cache).records().to_vec()
    }

    pub fn record(&self, record_id: &str) -> Option<Record> {
        lock(&self.cache).get(record_id).cloned()
    }

    pub fn mapping(&self) -> Option<HeaderMapping> {
        lock(&self.cache).mapping().cloned()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.cache).fetched_at()
    }

    // -- fetch --------------------------------------------------------------

    /// Load the table, or serve the cache when `use_cache` and it is fresh.
    /// A network read that would discard pending edits first asks `confirm`.
    pub async fn fetch(
        &self,
        use_cache: bool,
        confirm: &dyn DiscardConfirmation,
    ) -> Result<FetchOutcome, SyncError> {
        if use_cache {
            let cached = {
                let cache = lock(&self.cache);
                cache
                    .is_fresh(self.clock.now_utc())
                    .then(|| cache.records().to_vec())
            };
            if let Some(records) = cached {
                debug!(records = records.len(), "serving fresh cache");
                self.emit(SyncEventKind::CacheHit, SyncEventOutcome::Success, Vec::new(), "cache hit");
                return Ok(FetchOutcome::Cached { records });
            }
        }

        // Taken under the cache lock so an edit is either fully applied before
        // the pending check below or refused.
        let _guard = {
            let _cache = lock(&self.cache);
            self.acquire(Operation::Fetch)?
        };

        if self.tracker.has_pending_changes() {
            let pending = self.tracker.pending_count();
            if !confirm.confirm_discard(pending) {
                info!(pending, "refresh declined; pending edits kept");
                self.emit(
                    SyncEventKind::Fetch,
                    SyncEventOutcome::Aborted,
                    self.tracker.pending().ids(),
                    "discard declined",
                );
                return Ok(FetchOutcome::Aborted);
            }
            info!(pending, "refresh accepted; discarding pending edits");
            self.discard_pending();
        }

        self.update_status(|s| s.is_fetching = true);
        let range = self.options.read_range();
        let result = self.service.get_values(&range).await;

        let table = match result {
            Ok(table) => table,
            Err(err) => {
                let err = SyncError::from(err);
                if err.kind == SyncErrorKind::RateLimit && lock(&self.cache).is_loaded() {
                    warn!(status = ?err.http_status, "fetch rate limited; serving stale cache");
                }
                return Err(self.fail_fetch(err));
            }
        };

        let rows = table.string_rows();
        let Some((header, data)) = rows.split_first() else {
            return Err(self.fail_fetch(header_error(HeaderError::Empty)));
        };
        let mapping = match HeaderMapping::from_header_row(header) {
            Ok(mapping) => mapping,
            Err(err) => return Err(self.fail_fetch(header_error(err))),
        };

        let mut parsed = parse_rows(data, &mapping, &self.options.bounds);
        let placed = infer_placements(&mut parsed.records, &self.tracker);
        let now = self.clock.now_utc();
        let records = {
            let mut cache = lock(&self.cache);
            cache.replace(parsed.records, mapping, now);
            cache.records().to_vec()
        };

        info!(
            records = records.len(),
            placed,
            rejected = parsed.rejected_rows.len(),
            "fetch completed"
        );
        self.update_status(|s| {
            s.last_fetch_time = Some(now);
            s.last_fetch_error = None;
        });
        self.publish_pending();
        self.emit(
            SyncEventKind::Fetch,
            SyncEventOutcome::Success,
            Vec::new(),
            format!("{} records, {placed} placed", records.len()),
        );
        Ok(FetchOutcome::Fetched {
            records,
            placed,
            rejected_rows: parsed.rejected_rows,
        })
    }

    /// Fetch ignoring the TTL.
    pub async fn refresh(
        &self,
        confirm: &dyn DiscardConfirmation,
    ) -> Result<FetchOutcome, SyncError> {
        self.fetch(false, confirm).await
    }

    fn discard_pending(&self) {
        let mut cache = lock(&self.cache);
        for record in cache.records_mut() {
            if record.is_modified() {
                self.tracker.revert(record);
            }
        }
        self.tracker.clear_all();
        drop(cache);
        self.publish_pending();
    }

    fn fail_fetch(&self, err: SyncError) -> SyncError {
        error!(kind = %err.kind, status = ?err.http_status, error = %err.technical_message, "fetch failed");
        self.update_status(|s| s.last_fetch_error = Some(err.clone()));
        self.emit(
            SyncEventKind::Fetch,
            SyncEventOutcome::Error(err.to_string()),
            Vec::new(),
            "fetch failed",
        );
        err
    }

    // -- push ---------------------------------------------------------------

    /// Write every pending change in one batch call. Pending state survives any
    /// failure unchanged.
    pub async fn push(&self) -> Result<PushReport, SyncError> {
        let _guard = self.acquire(Operation::Push)?;
        self.update_status(|s| s.last_push_error = None);

        let plan = {
            let cache = lock(&self.cache);
            if cache.is_loaded() {
                if !prune_stale_pending(cache.records(), &self.tracker).is_empty() {
                    self.publish_pending();
                }
            }
            if self.tracker.has_pending_changes() {
                match cache.mapping() {
                    Some(mapping) => build_push_plan(
                        cache.records(),
                        self.tracker.pending(),
                        mapping,
                        &self.options.bounds,
                        &self.options.sheet_name,
                    ),
                    None => Err(SyncError::not_loaded()),
                }
            } else {
                Err(SyncError::no_pending_changes())
            }
        };
        let plan = match plan {
            Ok(plan) => plan,
            Err(err) => return Err(self.fail_push(err)),
        };

        self.update_status(|s| s.is_pushing = true);
        let ranges: Vec<String> = plan.request.data.iter().map(|d| d.range.clone()).collect();
        debug!(ranges = ranges.len(), records = plan.writes.len(), "sending batch update");
        let response = match self.service.batch_update(plan.request.clone()).await {
            Ok(response) => response,
            Err(err) => {
                let err = SyncError::from(err).with_failed_records(plan.record_ids());
                return Err(self.fail_push(err));
            }
        };

        let cleaned_ids = {
            let mut cache = lock(&self.cache);
            apply_push_success(cache.records_mut(), &plan, &self.tracker)
        };
        let partial_failure = if plan.excluded_ids.is_empty() {
            None
        } else {
            Some(SyncError::partial_failure(plan.excluded_ids.clone()))
        };
        let now = self.clock.now_utc();
        info!(
            ranges = ranges.len(),
            cells = response.total_updated_cells,
            excluded = plan.excluded_ids.len(),
            "push completed"
        );
        self.update_status(|s| {
            s.last_push_time = Some(now);
            s.last_push_error = partial_failure.clone();
        });
        self.publish_pending();
        self.emit(
            SyncEventKind::Push,
            SyncEventOutcome::Success,
            plan.record_ids(),
            format!("{} ranges, {} cells", ranges.len(), response.total_updated_cells),
        );

        Ok(PushReport {
            pushed_ids: plan.record_ids(),
            cleaned_ids,
            ranges,
            updated_cells: response.total_updated_cells,
            partial_failure,
        })
    }

    /// `push`, repeated while `policy` allows another attempt.
    pub async fn push_with_retry(&self, policy: &RetryPolicy) -> Result<PushReport, SyncError> {
        let mut attempt = 1;
        loop {
            match self.push().await {
                Ok(report) => return Ok(report),
                Err(err) => {
                    let Some(delay) = policy.delay_for(attempt, &err) else {
                        return Err(err);
                    };
                    warn!(attempt, kind = %err.kind, delay_ms = delay.as_millis() as u64, "push failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn fail_push(&self, err: SyncError) -> SyncError {
        error!(
            kind = %err.kind,
            status = ?err.http_status,
            records = err.failed_record_ids.len(),
            error = %err.technical_message,
            "push failed"
        );
        self.update_status(|s| s.last_push_error = Some(err.clone()));
        self.emit(
            SyncEventKind::Push,
            SyncEventOutcome::Error(err.to_string()),
            err.failed_record_ids.clone(),
            "push failed",
        );
        err
    }

    pub fn dismiss_push_error(&self) {
        self.update_status(|s| s.last_push_error = None);
    }

    // -- edits --------------------------------------------------------------

    /// Write `value` into `field` of a cached record and mark it modified.
    pub fn set_field(
        &self,
        record_id: &str,
        field: Field,
        value: FieldValue,
    ) -> Result<(), SyncError> {
        let result = {
            let mut cache = lock(&self.cache);
            self.refuse_during_fetch()?;
            let record = cache
                .get_mut(record_id)
                .ok_or_else(|| SyncError::unknown_record(record_id))?;
            self.tracker.apply_edit(record, field, value)
        };
        self.publish_pending();
        result.map_err(|err| {
            SyncError::new(SyncErrorKind::Validation, err.to_string())
                .with_failed_records(vec![record_id.to_string()])
        })
    }

    /// Flag `field` as diverged without changing its value.
    pub fn mark_field_modified(&self, record_id: &str, field: Field) -> Result<(), SyncError> {
        {
            let mut cache = lock(&self.cache);
            self.refuse_during_fetch()?;
            let record = cache
                .get_mut(record_id)
                .ok_or_else(|| SyncError::unknown_record(record_id))?;
            self.tracker.mark_field_modified(record, field);
        }
        self.publish_pending();
        Ok(())
    }

    /// Restore a record to its last synced values. Returns false when it had
    /// nothing to undo.
    pub fn revert(&self, record_id: &str) -> Result<bool, SyncError> {
        let reverted = {
            let mut cache = lock(&self.cache);
            self.refuse_during_fetch()?;
            let record = cache
                .get_mut(record_id)
                .ok_or_else(|| SyncError::unknown_record(record_id))?;
            self.tracker.revert(record)
        };
        self.publish_pending();
        if reverted {
            self.emit(
                SyncEventKind::Revert,
                SyncEventOutcome::Success,
                vec![record_id.to_string()],
                "reverted to last synced values",
            );
        }
        Ok(reverted)
    }

    /// Drop `record_id` from the pending set only.
    pub fn forget(&self, record_id: &str) -> bool {
        let removed = self.tracker.clear(record_id);
        self.publish_pending();
        removed
    }

    pub fn forget_all(&self) {
        self.tracker.clear_all();
        self.publish_pending();
    }

    // -- internals ----------------------------------------------------------

    fn acquire(&self, operation: Operation) -> Result<BusyGuard<'_>, SyncError> {
        let mut busy = lock(&self.busy);
        if let Some(current) = *busy {
            warn!(requested = operation.as_str(), running = current.as_str(), "sync refused: busy");
            return Err(SyncError::operation_in_progress(current.as_str()));
        }
        *busy = Some(operation);
        Ok(BusyGuard {
            engine: self,
            operation,
        })
    }

    /// Callers hold the cache lock; fetch takes its busy flag under the same lock.
    fn refuse_during_fetch(&self) -> Result<(), SyncError> {
        match *lock(&self.busy) {
            Some(Operation::Fetch) => Err(SyncError::operation_in_progress(Operation::Fetch.as_str())),
            _ => Ok(()),
        }
    }

    fn update_status(&self, f: impl FnOnce(&mut SyncStatus)) {
        self.status.send_modify(f);
    }

    fn publish_pending(&self) {
        let count = self.tracker.pending_count();
        self.status.send_if_modified(|s| {
            if s.pending_count == count {
                false
            } else {
                s.pending_count = count;
                true
            }
        });
    }

    fn emit(
        &self,
        kind: SyncEventKind,
        outcome: SyncEventOutcome,
        record_ids: Vec<String>,
        detail: impl Into<String>,
    ) {
        self.events
            .record(SyncEvent::new(kind, outcome, record_ids, detail));
    }
}

fn header_error(err: HeaderError) -> SyncError {
    match err {
        HeaderError::MissingRequired { field } => SyncError::missing_required_header(field),
        HeaderError::Empty => SyncError::new(SyncErrorKind::Configuration, err.to_string()),
    }
}

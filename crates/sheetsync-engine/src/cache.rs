//! Authoritative in-memory snapshot of the fetched table, with a passive TTL.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::header::HeaderMapping;
use crate::types::Record;

/// Source of "now" for freshness checks.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let step = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        match self.now.lock() {
            Ok(mut now) => *now += step,
            Err(poisoned) => *poisoned.into_inner() += step,
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Records and header mapping from the last successful fetch.
#[derive(Debug, Clone)]
pub struct RecordCache {
    records: Vec<Record>,
    mapping: Option<HeaderMapping>,
    fetched_at: Option<DateTime<Utc>>,
    ttl: Duration,
}

impl RecordCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: Vec::new(),
            mapping: None,
            fetched_at: None,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Populated and younger than the TTL at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let Some(fetched_at) = self.fetched_at else {
            return false;
        };
        match (now - fetched_at).to_std() {
            Ok(elapsed) => elapsed < self.ttl,
            // Clock stepped backwards.
            Err(_) => true,
        }
    }

    /// Replace the snapshot wholesale and restart the freshness window.
    pub fn replace(&mut self, records: Vec<Record>, mapping: HeaderMapping, now: DateTime<Utc>) {
        self.records = records;
        self.mapping = Some(mapping);
        self.fetched_at = Some(now);
    }

    pub fn is_loaded(&self) -> bool {
        self.fetched_at.is_some()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn mapping(&self) -> Option<&HeaderMapping> {
        self.mapping.as_ref()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Record> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

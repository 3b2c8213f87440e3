//! Shared set of record ids with unsaved local edits.
//!
//! One instance per session: clones share the same backing set, so every
//! surface holding a clone agrees on the pending count. Tests build isolated
//! instances with [`PendingChangeSet::new`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

#[derive(Clone)]
pub struct PendingChangeSet {
    ids: Arc<Mutex<HashSet<String>>>,
    count_tx: Arc<watch::Sender<usize>>,
}

impl Default for PendingChangeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PendingChangeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingChangeSet")
            .field("len", &self.len())
            .finish()
    }
}

impl PendingChangeSet {
    pub fn new() -> Self {
        let (count_tx, _) = watch::channel(0);
        Self {
            ids: Arc::new(Mutex::new(HashSet::new())),
            count_tx: Arc::new(count_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        match self.ids.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Called with the set lock held so concurrent writers publish in order.
    fn publish(&self, len: usize) {
        self.count_tx.send_if_modified(|current| {
            if *current == len {
                false
            } else {
                *current = len;
                true
            }
        });
    }

    /// Returns true when the id was not already pending.
    pub fn insert(&self, id: &str) -> bool {
        let mut ids = self.lock();
        let added = ids.insert(id.to_string());
        self.publish(ids.len());
        added
    }

    /// Returns true when the id was pending.
    pub fn remove(&self, id: &str) -> bool {
        let mut ids = self.lock();
        let removed = ids.remove(id);
        self.publish(ids.len());
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        let mut ids = self.lock();
        ids.clear();
        self.publish(0);
    }

    /// Pending ids, sorted for stable output.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Observe the pending count. The receiver sees the current value immediately.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count_tx.subscribe()
    }
}

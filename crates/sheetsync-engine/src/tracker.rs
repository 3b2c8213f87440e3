//! Per-record, per-field mutation tracking backed by the shared
//! [`PendingChangeSet`].

use tracing::debug;

use crate::pending::PendingChangeSet;
use crate::types::{Field, FieldValue, FieldValueError, Record};

#[derive(Debug, Clone, Default)]
pub struct MutationTracker {
    pending: PendingChangeSet,
}

impl MutationTracker {
    pub fn new(pending: PendingChangeSet) -> Self {
        Self { pending }
    }

    pub fn pending(&self) -> &PendingChangeSet {
        &self.pending
    }

    /// Flag `field` as diverged from the last sync. Idempotent.
    pub fn mark_field_modified(&self, record: &mut Record, field: Field) {
        if !record.original_values.contains_key(&field) {
            // Keep the originals invariant for records built outside the parser.
            record.original_values.insert(field, record.get(field));
        }
        if record.modified_fields.insert(field) {
            debug!(record_id = %record.id, field = %field, "field modified");
        }
        self.pending.insert(&record.id);
    }

    /// Write a value and mark it modified.
    pub fn apply_edit(
        &self,
        record: &mut Record,
        field: Field,
        value: FieldValue,
    ) -> Result<(), FieldValueError> {
        record.set(field, value)?;
        self.mark_field_modified(record, field);
        Ok(())
    }

    /// Restore every modified field from `original_values` and drop the record
    /// from the pending set. Returns false when nothing was modified.
    pub fn revert(&self, record: &mut Record) -> bool {
        let fields: Vec<Field> = record.modified_fields.iter().copied().collect();
        for field in &fields {
            if let Some(original) = record.original_values.get(field).cloned() {
                if let Err(err) = record.set(*field, original) {
                    debug!(record_id = %record.id, field = %field, %err, "original value not restorable");
                }
            }
        }
        record.modified_fields.clear();
        self.pending.remove(&record.id);
        !fields.is_empty()
    }

    /// Forget that `record_id` has pending work. Leaves `modified_fields` alone.
    pub fn clear(&self, record_id: &str) -> bool {
        self.pending.remove(record_id)
    }

    pub fn clear_all(&self) {
        self.pending.clear();
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn synced(row: u32, title: &str) -> Record {
        let mut r = Record::new(row, title);
        r.x = 10.0;
        r.y = 20.0;
        r.snapshot_originals();
        r
    }

    #[test]
    fn mark_is_idempotent() {
        let tracker = MutationTracker::default();
        let mut r = synced(2, "Dragon");
        tracker.mark_field_modified(&mut r, Field::X);
        tracker.mark_field_modified(&mut r, Field::X);
        assert!(r.is_modified());
        assert_eq!(r.modified_fields.len(), 1);
        assert_eq!(tracker.pending_count(), 1);
        assert!(tracker.has_pending_changes());
    }

    #[test]
    fn clear_only_touches_pending_set() {
        let tracker = MutationTracker::default();
        let mut r = synced(2, "Dragon");
        tracker.mark_field_modified(&mut r, Field::Y);
        assert!(tracker.clear(&r.id));
        assert!(!tracker.has_pending_changes());
        assert!(r.modified_fields.contains(&Field::Y));
    }

    #[test]
    fn clear_all_empties_shared_set() {
        let pending = PendingChangeSet::new();
        let tracker = MutationTracker::new(pending.clone());
        let mut a = synced(2, "A");
        let mut b = synced(3, "B");
        tracker.mark_field_modified(&mut a, Field::X);
        tracker.mark_field_modified(&mut b, Field::X);
        assert_eq!(pending.len(), 2);
        tracker.clear_all();
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn revert_restores_originals() {
        let tracker = MutationTracker::default();
        let mut r = synced(2, "Dragon");
        tracker
            .apply_edit(&mut r, Field::X, FieldValue::Number(500.0))
            .unwrap();
        tracker
            .apply_edit(&mut r, Field::Title, FieldValue::Text("Wyrm".into()))
            .unwrap();
        assert!(tracker.revert(&mut r));
        assert_eq!(r.x, 10.0);
        assert_eq!(r.title, "Dragon");
        assert!(!r.is_modified());
        assert_eq!(tracker.pending_count(), 0);
        assert!(!tracker.revert(&mut r));
    }

    #[test]
    fn rejected_edit_is_not_tracked() {
        let tracker = MutationTracker::default();
        let mut r = synced(2, "Dragon");
        assert!(tracker
            .apply_edit(&mut r, Field::Resolved, FieldValue::Number(1.0))
            .is_err());
        assert!(!r.is_modified());
        assert!(!tracker.has_pending_changes());
    }
}

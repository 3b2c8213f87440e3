//! Auto-placement: backfill origin records from a sibling aimed at the same
//! target location.

use std::collections::HashMap;

use tracing::debug;

use crate::tracker::MutationTracker;
use crate::types::{Field, Record};

/// Copy coordinates onto every origin record whose target-location key matches
/// a placed record. The first placed record seen for a key wins. Placed fields
/// are marked modified so the next push persists them. Returns the number of
/// records placed.
pub fn infer_placements(records: &mut [Record], tracker: &MutationTracker) -> usize {
    let mut anchors: HashMap<String, (f64, f64)> = HashMap::new();
    for record in records.iter() {
        if record.is_at_origin() {
            continue;
        }
        if let Some(key) = record.target_location_key() {
            anchors
                .entry(key.to_string())
                .or_insert((record.x, record.y));
        }
    }

    let mut placed = 0;
    for record in records.iter_mut() {
        if !record.is_at_origin() {
            continue;
        }
        let Some(&(x, y)) = record.target_location_key().and_then(|k| anchors.get(k)) else {
            continue;
        };
        record.x = x;
        record.y = y;
        tracker.mark_field_modified(record, Field::X);
        tracker.mark_field_modified(record, Field::Y);
        debug!(record_id = %record.id, x, y, "auto-placed from target location");
        placed += 1;
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(row: u32, loc: &str, x: f64, y: f64) -> Record {
        let mut r = Record::new(row, format!("r{row}"));
        r.location_targeted = Some(loc.to_string());
        r.x = x;
        r.y = y;
        r.snapshot_originals();
        r
    }

    #[test]
    fn origin_record_copies_sibling_coordinates() {
        let tracker = MutationTracker::default();
        let mut records = vec![rec(2, "A", 0.0, 0.0), rec(3, "A", 100.0, 200.0)];
        assert_eq!(infer_placements(&mut records, &tracker), 1);
        assert_eq!((records[0].x, records[0].y), (100.0, 200.0));
        assert!(records[0].is_modified());
        assert!(records[0].modified_fields.contains(&Field::X));
        assert!(records[0].modified_fields.contains(&Field::Y));
        assert!(!records[1].is_modified());
        assert_eq!(tracker.pending_count(), 1);
    }

    #[test]
    fn first_placed_record_wins() {
        let tracker = MutationTracker::default();
        let mut records = vec![
            rec(2, "A", 0.0, 0.0),
            rec(3, "A", 100.0, 200.0),
            rec(4, "A", 300.0, 400.0),
        ];
        infer_placements(&mut records, &tracker);
        assert_eq!((records[0].x, records[0].y), (100.0, 200.0));

        let tracker = MutationTracker::default();
        let mut reversed = vec![
            rec(4, "A", 300.0, 400.0),
            rec(3, "A", 100.0, 200.0),
            rec(2, "A", 0.0, 0.0),
        ];
        infer_placements(&mut reversed, &tracker);
        assert_eq!((reversed[2].x, reversed[2].y), (300.0, 400.0));
    }

    #[test]
    fn reversed_input_still_places_origin_record() {
        let tracker = MutationTracker::default();
        let mut records = vec![rec(3, "A", 100.0, 200.0), rec(2, "A", 0.0, 0.0)];
        assert_eq!(infer_placements(&mut records, &tracker), 1);
        assert_eq!((records[1].x, records[1].y), (100.0, 200.0));
        assert!(records[1].is_modified());
    }

    #[test]
    fn unmatched_key_is_left_alone() {
        let tracker = MutationTracker::default();
        let mut records = vec![rec(2, "B", 0.0, 0.0), rec(3, "A", 100.0, 200.0)];
        assert_eq!(infer_placements(&mut records, &tracker), 0);
        assert!(records[0].is_at_origin());
        assert!(!tracker.has_pending_changes());
    }

    #[test]
    fn records_without_key_are_ignored() {
        let tracker = MutationTracker::default();
        let mut orphan = Record::new(2, "orphan");
        orphan.snapshot_originals();
        let mut records = vec![orphan, rec(3, "A", 1.0, 1.0)];
        assert_eq!(infer_placements(&mut records, &tracker), 0);
    }
}

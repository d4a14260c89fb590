// ============================================================================
// Activity ordering
// ============================================================================
//
// Total order used for display:
//   1. priority, most urgent first
//   2. last check-in, most recent first
//   3. entries without a check-in sort after those with one
//
// Sorting is stable, so entries equal on both keys keep their relative order
// (snapshot order, then arrival order of change events).
//
// ============================================================================

use crate::model::EnrichedActivity;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Compare two entries for display; `Less` means `a` is shown first
pub fn compare_activity(a: &EnrichedActivity, b: &EnrichedActivity) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| compare_checkin_desc(a.last_checkin, b.last_checkin))
}

/// Most recent first; a missing check-in sorts after any present one
fn compare_checkin_desc(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => b.cmp(&a),
    }
}

/// Stable re-sort returning the ordered list
pub fn resort(mut list: Vec<EnrichedActivity>) -> Vec<EnrichedActivity> {
    resort_in_place(&mut list);
    list
}

pub fn resort_in_place(list: &mut [EnrichedActivity]) {
    list.sort_by(compare_activity);
}

/// Whether every adjacent pair already respects the display order
pub fn is_sorted(list: &[EnrichedActivity]) -> bool {
    list.windows(2)
        .all(|pair| compare_activity(&pair[0], &pair[1]) != Ordering::Greater)
}

//! Assertions for stream and aggregate invariants.

use crate::aggregate::{Aggregate, AggregateRoot};
use crate::event_log::RecordedEvent;
use crate::types::EventVersion;

/// Asserts that recorded events carry versions `1, 2, 3, ...` with no gap.
///
/// # Panics
/// Panics on the first out-of-sequence version.
pub fn assert_contiguous_versions(events: &[RecordedEvent]) {
    let mut expected = EventVersion::initial();
    for event in events {
        expected = expected.next();
        assert_eq!(
            event.version, expected,
            "stream '{}' skips from {} to {}",
            event.stream,
            expected.into_inner().saturating_sub(1),
            event.version
        );
    }
}

/// Asserts that events were recorded in non-decreasing time order.
///
/// # Panics
/// Panics if a later event carries an earlier timestamp.
pub fn assert_recorded_in_order(events: &[RecordedEvent]) {
    for window in events.windows(2) {
        assert!(
            window[0].recorded_at <= window[1].recorded_at,
            "event {} was recorded after event {}",
            window[0].version,
            window[1].version
        );
    }
}

/// Asserts that `aggregate` has no pending changes and sits at `version`.
///
/// # Panics
/// Panics if either condition fails.
pub fn assert_committed_at<A: Aggregate>(aggregate: &AggregateRoot<A>, version: EventVersion) {
    assert!(
        !aggregate.has_uncommitted_changes(),
        "aggregate '{}' still has {} pending change(s)",
        aggregate.stream_identity(),
        aggregate.uncommitted_changes().len()
    );
    assert_eq!(
        aggregate.version(),
        version,
        "aggregate '{}' is at the wrong version",
        aggregate.stream_identity()
    );
}

//! Core value types for the `EventRepo` aggregate repository.
//!
//! Types that carry a domain constraint use smart constructors so an invalid
//! value can never be built ("parse, don't validate"). Versions follow a
//! single convention everywhere: `0` means "no events", the first event of a
//! stream has version `1`, and an aggregate's version equals the number of
//! events folded into it.

use chrono::{DateTime, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The name of a category of aggregates, e.g. `Vendor`.
///
/// One log stream exists per (`AggregateType`, aggregate id) pair. Names are
/// non-empty, at most 128 characters and contain no whitespace so that they
/// can be embedded in a stream key verbatim.
#[nutype(
    validate(
        not_empty,
        len_char_max = 128,
        predicate = |name: &str| !name.chars().any(char::is_whitespace)
    ),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct AggregateType(String);

/// The version of a stream, or of an aggregate replayed from one.
///
/// `0` is the version of a stream with no events; each appended event
/// advances the version by exactly one.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Into,
    Serialize,
    Deserialize
))]
pub struct EventVersion(u64);

impl EventVersion {
    /// The version of an aggregate that has never been persisted.
    pub fn initial() -> Self {
        Self::new(0)
    }

    /// Returns the version after this one.
    #[must_use]
    pub fn next(self) -> Self {
        self.advance(1)
    }

    /// Returns this version advanced by `count` events.
    #[must_use]
    pub fn advance(self, count: u64) -> Self {
        Self::new(self.into_inner().saturating_add(count))
    }

    /// Number of versions between `earlier` and `self`, zero if `earlier` is ahead.
    pub fn distance_from(self, earlier: Self) -> u64 {
        self.into_inner().saturating_sub(earlier.into_inner())
    }

    /// Whether this is the version of an empty / never persisted stream.
    pub fn is_initial(self) -> bool {
        self.into_inner() == 0
    }
}

impl Default for EventVersion {
    fn default() -> Self {
        Self::initial()
    }
}

/// A globally unique event identifier.
///
/// Generated identifiers are `UUIDv7`, so ids created in sequence sort in
/// creation order.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    AsRef,
    Display,
    Serialize,
    Deserialize
))]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a fresh time-ordered identifier.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// A timestamp recorded by the event log when an event is appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a new timestamp from a UTC `DateTime`.
    pub const fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Creates a timestamp representing the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn aggregate_type_accepts_identifier_like_names(s in "[A-Za-z][A-Za-z0-9_.:]{0,127}") {
            let result = AggregateType::try_new(s.clone());
            prop_assert!(result.is_ok());
            let aggregate_type = result.unwrap();
            prop_assert_eq!(aggregate_type.as_ref(), &s);
        }

        #[test]
        fn aggregate_type_rejects_names_with_whitespace(
            head in "[A-Za-z]{1,10}",
            tail in "[A-Za-z]{1,10}",
            ws in prop::sample::select(vec![" ", "\t", "\n"]),
        ) {
            let name = format!("{head}{ws}{tail}");
            prop_assert!(AggregateType::try_new(name).is_err());
        }

        #[test]
        fn aggregate_type_rejects_names_over_128_chars(s in "[a-z]{129,300}") {
            prop_assert!(AggregateType::try_new(s).is_err());
        }

        #[test]
        fn version_advance_adds_exactly_count(start in 0u64..1_000_000, count in 0u64..1_000) {
            let version = EventVersion::new(start).advance(count);
            prop_assert_eq!(version.into_inner(), start + count);
            prop_assert_eq!(version.distance_from(EventVersion::new(start)), count);
        }
    }

    #[test]
    fn empty_aggregate_type_is_rejected() {
        assert!(AggregateType::try_new(String::new()).is_err());
    }

    #[test]
    fn initial_version_is_zero() {
        assert!(EventVersion::initial().is_initial());
        assert_eq!(EventVersion::default(), EventVersion::new(0));
        assert_eq!(EventVersion::initial().next(), EventVersion::new(1));
    }

    #[test]
    fn version_arithmetic_saturates() {
        assert_eq!(EventVersion::new(u64::MAX).next(), EventVersion::new(u64::MAX));
        assert_eq!(EventVersion::new(2).distance_from(EventVersion::new(5)), 0);
    }

    #[test]
    fn generated_event_ids_are_v7() {
        let id = EventId::generate();
        assert_eq!(id.as_ref().get_version(), Some(uuid::Version::SortRand));
        assert_ne!(id, EventId::generate());
    }
}

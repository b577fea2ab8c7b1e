//! Property test generators for core types.
//!
//! Each generator respects the validation rules of its type.

use crate::config::{MaxTryCount, PageSize, RepositoryConfig};
use crate::event_log::EventMetadata;
use crate::serialization::SerializationFormat;
use crate::types::{AggregateType, EventId, EventVersion, Timestamp};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

/// Generates valid `AggregateType` values.
pub fn arb_aggregate_type() -> impl Strategy<Value = AggregateType> {
    "[A-Z][a-zA-Z0-9_]{0,63}".prop_filter_map("Invalid AggregateType", |s| {
        AggregateType::try_new(s).ok()
    })
}

/// Generates aggregate id strings safe to embed in a stream key.
pub fn arb_aggregate_id() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9-]{0,35}"
}

/// Generates fresh `EventId` values.
pub fn arb_event_id() -> impl Strategy<Value = EventId> {
    any::<()>().prop_map(|()| EventId::generate())
}

/// Generates `EventVersion` values up to 1000.
pub fn arb_event_version() -> impl Strategy<Value = EventVersion> {
    (0u64..=1000).prop_map(EventVersion::new)
}

/// Generates small `EventVersion` values, 0 to 10.
pub fn arb_small_event_version() -> impl Strategy<Value = EventVersion> {
    (0u64..=10).prop_map(EventVersion::new)
}

/// Generates valid `Timestamp` values up to the year 9999.
pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
    (0i64..=253_402_300_799).prop_filter_map("Invalid timestamp", |secs| {
        Utc.timestamp_opt(secs, 0).single().map(Timestamp::new)
    })
}

/// Generates metadata with optional causation and correlation ids.
pub fn arb_event_metadata() -> impl Strategy<Value = EventMetadata> {
    (
        prop::option::of(arb_event_id()),
        prop::option::of("[a-z0-9-]{1,16}"),
        prop::collection::hash_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..3),
    )
        .prop_map(|(causation_id, correlation_id, custom)| EventMetadata {
            causation_id,
            correlation_id,
            custom,
        })
}

/// Generates every serialization format.
pub fn arb_serialization_format() -> impl Strategy<Value = SerializationFormat> {
    prop_oneof![
        Just(SerializationFormat::Json),
        Just(SerializationFormat::MessagePack),
        Just(SerializationFormat::Bincode),
    ]
}

/// Generates page sizes small enough to force several slices per stream.
pub fn arb_small_page_size() -> impl Strategy<Value = PageSize> {
    (1usize..=8).prop_filter_map("Invalid PageSize", |n| PageSize::try_new(n).ok())
}

/// Generates valid `MaxTryCount` values.
pub fn arb_max_try_count() -> impl Strategy<Value = MaxTryCount> {
    (1u32..=10).prop_filter_map("Invalid MaxTryCount", |n| MaxTryCount::try_new(n).ok())
}

/// Generates repository configurations.
pub fn arb_repository_config() -> impl Strategy<Value = RepositoryConfig> {
    (
        arb_small_page_size(),
        arb_max_try_count(),
        arb_serialization_format(),
    )
        .prop_map(|(page_size, max_try_count, format)| {
            RepositoryConfig::new()
                .with_page_size(page_size)
                .with_max_try_count(max_try_count)
                .with_format(format)
        })
}

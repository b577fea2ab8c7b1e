//! `EventRepo` - event-sourced aggregate repository
//!
//! An aggregate's state is the left fold of its event stream. This library
//! loads aggregates by replaying their streams in bounded slices through a
//! pluggable [`EventLog`], commits pending changes with optimistic
//! concurrency and a bounded conflict-resolution retry, caches materialised
//! aggregates, and tombstones deleted streams.
//!
//! ```rust,ignore
//! let repository = AggregateRepository::<Vendor, _>::new(log)
//!     .with_cache(Arc::new(InMemoryAggregateCache::new()))
//!     .with_resolver(CommutativeKinds::new(["ItemAdded"]));
//!
//! let mut vendor = repository.read(&vendor_id).await?;
//! vendor.record(VendorEvent::Renamed { name: "ACME".into() })?;
//! repository.update(&mut vendor).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod conflict;
pub mod entity;
pub mod errors;
pub mod event_log;
pub mod identity;
pub mod repository;
pub mod serialization;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use aggregate::{Aggregate, AggregateRoot, DomainEvent, EventHandler, EventHandlers};
pub use cache::{AggregateCache, CacheStats, CacheVersion, InMemoryAggregateCache, NoCache};
pub use config::{MaxCacheSize, MaxTryCount, PageSize, RepositoryConfig};
pub use conflict::{
    AcceptConflicts, CommutativeKinds, ConflictResolution, ConflictResolver, RejectConflicts,
};
pub use entity::{Entity, RootRef};
pub use errors::{
    EventLogError, EventLogResult, HandlerRegistrationError, RepositoryError, RepositoryResult,
};
pub use event_log::{
    EventData, EventLog, EventMetadata, ExpectedVersion, RecordedEvent, Slice, WriteOutcome,
};
pub use identity::{AggregateId, StreamIdentity};
pub use repository::{AggregateRepository, UpdateReport};
pub use serialization::{SerializationError, SerializationFormat};
pub use types::{AggregateType, EventId, EventVersion, Timestamp};

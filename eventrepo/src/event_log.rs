//! The append-only event log port.
//!
//! [`EventLog`] is the narrow interface the repository consumes. It is
//! backend-independent: one implementation may be in memory, another
//! networked. Implementations own concurrency safety and must give
//! compare-and-swap semantics on each stream's version: of two concurrent
//! conditional writes against the same expected version, exactly one wins.
//!
//! A losing conditional write is not an error. It comes back as
//! [`WriteOutcome::Conflict`] carrying the expected and actual versions.

use crate::errors::EventLogResult;
use crate::identity::StreamIdentity;
use crate::types::{EventId, EventVersion, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Expected version for optimistic concurrency control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// The stream must not exist yet, or exist without events.
    NoStream,
    /// The stream must be at exactly this version.
    Exact(EventVersion),
    /// Any version is acceptable (no concurrency control).
    Any,
}

impl ExpectedVersion {
    /// The expectation of an aggregate that last saw `version`.
    pub fn from_version(version: EventVersion) -> Self {
        if version.is_initial() {
            Self::NoStream
        } else {
            Self::Exact(version)
        }
    }

    /// The numeric version this expectation names, `0` for `NoStream`.
    pub fn as_version(self) -> Option<EventVersion> {
        match self {
            Self::NoStream => Some(EventVersion::initial()),
            Self::Exact(version) => Some(version),
            Self::Any => None,
        }
    }

    /// Whether a stream currently at `current` satisfies this expectation.
    pub fn matches(self, current: EventVersion) -> bool {
        match self {
            Self::NoStream => current.is_initial(),
            Self::Exact(expected) => expected == current,
            Self::Any => true,
        }
    }
}

/// Metadata that can be attached to events for tracking and correlation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// ID of the event that caused this event (for causation tracking)
    pub causation_id: Option<EventId>,
    /// ID used to correlate related events across multiple commands
    pub correlation_id: Option<String>,
    /// Additional custom metadata
    pub custom: HashMap<String, String>,
}

impl EventMetadata {
    /// Creates new empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the causation ID.
    #[must_use]
    pub const fn with_causation_id(mut self, causation_id: EventId) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    /// Sets the correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Adds custom metadata.
    #[must_use]
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }
}

/// A serialized event on its way into the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventData {
    /// Unique identifier for this event
    pub event_id: EventId,
    /// Event-kind tag
    pub kind: String,
    /// MIME type of `data`
    pub content_type: String,
    /// Serialized payload
    pub data: Vec<u8>,
    /// Optional metadata for this event
    pub metadata: Option<EventMetadata>,
}

impl EventData {
    /// Creates a new event with a fresh id.
    pub fn new(kind: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            event_id: EventId::generate(),
            kind: kind.into(),
            content_type: content_type.into(),
            data,
            metadata: None,
        }
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// An event as it exists in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Unique identifier for this event
    pub event_id: EventId,
    /// Key of the stream this event belongs to
    pub stream: StreamIdentity,
    /// Version of this event within its stream; the first event is `1`
    pub version: EventVersion,
    /// When the log stored the event
    pub recorded_at: Timestamp,
    /// Event-kind tag
    pub kind: String,
    /// MIME type of `data`
    pub content_type: String,
    /// Serialized payload
    pub data: Vec<u8>,
    /// Optional metadata for this event
    pub metadata: Option<EventMetadata>,
}

impl RecordedEvent {
    /// Stores `event` in `stream` at `version`.
    pub fn record(stream: StreamIdentity, version: EventVersion, event: EventData) -> Self {
        Self {
            event_id: event.event_id,
            stream,
            version,
            recorded_at: Timestamp::now(),
            kind: event.kind,
            content_type: event.content_type,
            data: event.data,
            metadata: event.metadata,
        }
    }
}

/// A bounded, ordered window of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    /// Version of the first event requested
    pub from_version: EventVersion,
    /// Events with versions in `[from_version, from_version + count)`, in order
    pub events: Vec<RecordedEvent>,
    /// The version to request next
    pub next_version: EventVersion,
    /// Whether the end of the stream lies within this window
    pub end_of_stream: bool,
}

impl Slice {
    /// Builds a slice and derives `next_version` from the returned events.
    pub fn new(
        from_version: EventVersion,
        events: Vec<RecordedEvent>,
        end_of_stream: bool,
    ) -> Self {
        let next_version = events
            .last()
            .map_or(from_version, |event| event.version.next());
        Self {
            from_version,
            events,
            next_version,
            end_of_stream,
        }
    }

    /// Whether the slice holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events in the slice.
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// Typed result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was applied; the stream is now at this version.
    Committed(EventVersion),
    /// The stream's version did not satisfy the expectation.
    Conflict {
        /// What the writer expected
        expected: ExpectedVersion,
        /// The stream's version at the time of the write
        actual: EventVersion,
    },
}

/// The append-only, per-stream event log consumed by the repository.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Opens the log. Operations on a closed log fail with `NotOpen`.
    async fn open(&self) -> EventLogResult<()>;

    /// Closes the log.
    async fn close(&self) -> EventLogResult<()>;

    /// Whether the log is currently open.
    fn is_open(&self) -> bool;

    /// Reads up to `count` events starting at version `start` (inclusive).
    ///
    /// Fails with `StreamNotFound` or `StreamDeleted`.
    async fn read_forward(
        &self,
        stream: &StreamIdentity,
        start: EventVersion,
        count: usize,
    ) -> EventLogResult<Slice>;

    /// Appends `events` if the stream's version satisfies `expected`.
    ///
    /// `NoStream` creates the stream. Appending to a tombstoned stream fails
    /// with `StreamDeleted`; an `Exact` expectation against a missing stream
    /// fails with `StreamNotFound`.
    async fn append(
        &self,
        stream: &StreamIdentity,
        expected: ExpectedVersion,
        events: Vec<EventData>,
    ) -> EventLogResult<WriteOutcome>;

    /// Tombstones the stream if its version satisfies `expected`.
    ///
    /// Fails with `StreamNotFound` or `StreamDeleted` like `append`.
    async fn delete(
        &self,
        stream: &StreamIdentity,
        expected: ExpectedVersion,
    ) -> EventLogResult<WriteOutcome>;

    /// Whether the stream exists and is not tombstoned.
    async fn exists(&self, stream: &StreamIdentity) -> EventLogResult<bool>;

    /// Current version of a live stream, `None` if absent or tombstoned.
    async fn stream_version(&self, stream: &StreamIdentity) -> EventLogResult<Option<EventVersion>>;
}

#[async_trait]
impl<T> EventLog for Arc<T>
where
    T: EventLog + ?Sized,
{
    async fn open(&self) -> EventLogResult<()> {
        (**self).open().await
    }

    async fn close(&self) -> EventLogResult<()> {
        (**self).close().await
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    async fn read_forward(
        &self,
        stream: &StreamIdentity,
        start: EventVersion,
        count: usize,
    ) -> EventLogResult<Slice> {
        (**self).read_forward(stream, start, count).await
    }

    async fn append(
        &self,
        stream: &StreamIdentity,
        expected: ExpectedVersion,
        events: Vec<EventData>,
    ) -> EventLogResult<WriteOutcome> {
        (**self).append(stream, expected, events).await
    }

    async fn delete(
        &self,
        stream: &StreamIdentity,
        expected: ExpectedVersion,
    ) -> EventLogResult<WriteOutcome> {
        (**self).delete(stream, expected).await
    }

    async fn exists(&self, stream: &StreamIdentity) -> EventLogResult<bool> {
        (**self).exists(stream).await
    }

    async fn stream_version(
        &self,
        stream: &StreamIdentity,
    ) -> EventLogResult<Option<EventVersion>> {
        (**self).stream_version(stream).await
    }
}

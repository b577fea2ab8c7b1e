//! In-memory event log for `EventRepo`
//!
//! This crate provides an in-memory implementation of the [`EventLog`]
//! port, useful for testing and development where persistence is not
//! required. Streams are kept with their tombstone flag so a deleted stream
//! stays distinguishable from one that never existed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use eventrepo::errors::{EventLogError, EventLogResult};
use eventrepo::event_log::{
    EventData, EventLog, ExpectedVersion, RecordedEvent, Slice, WriteOutcome,
};
use eventrepo::identity::StreamIdentity;
use eventrepo::types::EventVersion;
use parking_lot::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct StreamRecord {
    events: Vec<RecordedEvent>,
    deleted: bool,
}

impl StreamRecord {
    fn version(&self) -> EventVersion {
        self.events
            .last()
            .map_or_else(EventVersion::initial, |event| event.version)
    }
}

/// Thread-safe in-memory event log for testing.
///
/// Clones share storage. A new log is open.
#[derive(Debug, Clone)]
pub struct InMemoryEventLog {
    streams: Arc<RwLock<HashMap<StreamIdentity, StreamRecord>>>,
    open: Arc<AtomicBool>,
}

impl InMemoryEventLog {
    /// Create a new, open, empty log.
    pub fn new() -> Self {
        Self {
            streams: Arc::new(RwLock::new(HashMap::new())),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Every event ever appended to `stream`, tombstoned or not.
    pub fn recorded_events(&self, stream: &StreamIdentity) -> Vec<RecordedEvent> {
        self.streams
            .read()
            .get(stream)
            .map(|record| record.events.clone())
            .unwrap_or_default()
    }

    /// Whether `stream` carries a tombstone.
    pub fn is_tombstoned(&self, stream: &StreamIdentity) -> bool {
        self.streams
            .read()
            .get(stream)
            .is_some_and(|record| record.deleted)
    }

    /// Number of streams ever created, tombstoned ones included.
    pub fn stream_count(&self) -> usize {
        self.streams.read().len()
    }

    fn ensure_open(&self) -> EventLogResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(EventLogError::NotOpen)
        }
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn open(&self) -> EventLogResult<()> {
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    async fn close(&self) -> EventLogResult<()> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn read_forward(
        &self,
        stream: &StreamIdentity,
        start: EventVersion,
        count: usize,
    ) -> EventLogResult<Slice> {
        self.ensure_open()?;
        let streams = self.streams.read();
        let record = streams
            .get(stream)
            .ok_or_else(|| EventLogError::StreamNotFound(stream.clone()))?;
        if record.deleted {
            return Err(EventLogError::StreamDeleted(stream.clone()));
        }

        // Versions start at 1, so version v lives at index v - 1.
        let skip = usize::try_from(start.into_inner().saturating_sub(1))
            .map_err(|_| EventLogError::Internal(format!("start version {start} out of range")))?;
        let events: Vec<_> = record
            .events
            .iter()
            .skip(skip)
            .take(count)
            .cloned()
            .collect();
        let end_of_stream = skip.saturating_add(events.len()) >= record.events.len();
        Ok(Slice::new(start, events, end_of_stream))
    }

    async fn append(
        &self,
        stream: &StreamIdentity,
        expected: ExpectedVersion,
        events: Vec<EventData>,
    ) -> EventLogResult<WriteOutcome> {
        self.ensure_open()?;
        let mut streams = self.streams.write();

        let current = match streams.get(stream) {
            Some(record) if record.deleted => {
                return Err(EventLogError::StreamDeleted(stream.clone()));
            }
            Some(record) => record.version(),
            None if matches!(expected, ExpectedVersion::Exact(_)) => {
                return Err(EventLogError::StreamNotFound(stream.clone()));
            }
            None => EventVersion::initial(),
        };
        if !expected.matches(current) {
            return Ok(WriteOutcome::Conflict {
                expected,
                actual: current,
            });
        }

        let record = streams.entry(stream.clone()).or_default();
        let mut version = current;
        for event in events {
            version = version.next();
            record
                .events
                .push(RecordedEvent::record(stream.clone(), version, event));
        }
        debug!(%stream, %version, "appended");
        Ok(WriteOutcome::Committed(version))
    }

    async fn delete(
        &self,
        stream: &StreamIdentity,
        expected: ExpectedVersion,
    ) -> EventLogResult<WriteOutcome> {
        self.ensure_open()?;
        let mut streams = self.streams.write();
        let record = streams
            .get_mut(stream)
            .ok_or_else(|| EventLogError::StreamNotFound(stream.clone()))?;
        if record.deleted {
            return Err(EventLogError::StreamDeleted(stream.clone()));
        }

        let current = record.version();
        if !expected.matches(current) {
            return Ok(WriteOutcome::Conflict {
                expected,
                actual: current,
            });
        }
        record.deleted = true;
        debug!(%stream, %current, "tombstoned");
        Ok(WriteOutcome::Committed(current))
    }

    async fn exists(&self, stream: &StreamIdentity) -> EventLogResult<bool> {
        self.ensure_open()?;
        Ok(self
            .streams
            .read()
            .get(stream)
            .is_some_and(|record| !record.deleted))
    }

    async fn stream_version(
        &self,
        stream: &StreamIdentity,
    ) -> EventLogResult<Option<EventVersion>> {
        self.ensure_open()?;
        Ok(self
            .streams
            .read()
            .get(stream)
            .filter(|record| !record.deleted)
            .map(StreamRecord::version))
    }
}

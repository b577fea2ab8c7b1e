//! An [`EventLog`] wrapper that records the calls made through it.

use async_trait::async_trait;
use eventrepo::errors::EventLogResult;
use eventrepo::event_log::{EventData, EventLog, ExpectedVersion, Slice, WriteOutcome};
use eventrepo::identity::StreamIdentity;
use eventrepo::types::EventVersion;
use parking_lot::Mutex;

/// One `read_forward` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCall {
    /// First version requested
    pub start: EventVersion,
    /// Maximum number of events requested
    pub count: usize,
    /// Events actually returned, `None` if the read failed
    pub returned: Option<usize>,
}

/// Forwards to an inner log and records reads and appends.
#[derive(Debug, Default)]
pub struct CountingLog<L> {
    inner: L,
    reads: Mutex<Vec<ReadCall>>,
    appends: Mutex<usize>,
}

impl<L> CountingLog<L> {
    /// Wraps `inner`.
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            reads: Mutex::new(Vec::new()),
            appends: Mutex::new(0),
        }
    }

    /// The wrapped log.
    pub const fn inner(&self) -> &L {
        &self.inner
    }

    /// Reads issued so far, in order.
    pub fn reads(&self) -> Vec<ReadCall> {
        self.reads.lock().clone()
    }

    /// Sizes of the slices returned so far, failed reads excluded.
    pub fn slice_sizes(&self) -> Vec<usize> {
        self.reads.lock().iter().filter_map(|call| call.returned).collect()
    }

    /// Number of append calls so far.
    pub fn appends(&self) -> usize {
        *self.appends.lock()
    }

    /// Forgets every recorded call.
    pub fn reset(&self) {
        self.reads.lock().clear();
        *self.appends.lock() = 0;
    }
}

#[async_trait]
impl<L: EventLog> EventLog for CountingLog<L> {
    async fn open(&self) -> EventLogResult<()> {
        self.inner.open().await
    }

    async fn close(&self) -> EventLogResult<()> {
        self.inner.close().await
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn read_forward(
        &self,
        stream: &StreamIdentity,
        start: EventVersion,
        count: usize,
    ) -> EventLogResult<Slice> {
        let result = self.inner.read_forward(stream, start, count).await;
        self.reads.lock().push(ReadCall {
            start,
            count,
            returned: result.as_ref().ok().map(Slice::len),
        });
        result
    }

    async fn append(
        &self,
        stream: &StreamIdentity,
        expected: ExpectedVersion,
        events: Vec<EventData>,
    ) -> EventLogResult<WriteOutcome> {
        *self.appends.lock() += 1;
        self.inner.append(stream, expected, events).await
    }

    async fn delete(
        &self,
        stream: &StreamIdentity,
        expected: ExpectedVersion,
    ) -> EventLogResult<WriteOutcome> {
        self.inner.delete(stream, expected).await
    }

    async fn exists(&self, stream: &StreamIdentity) -> EventLogResult<bool> {
        self.inner.exists(stream).await
    }

    async fn stream_version(
        &self,
        stream: &StreamIdentity,
    ) -> EventLogResult<Option<EventVersion>> {
        self.inner.stream_version(stream).await
    }
}

//! The aggregate repository.
//!
//! [`AggregateRepository`] materialises aggregates by replaying their
//! streams in bounded slices, persists pending changes with optimistic
//! concurrency and a bounded conflict-resolution retry, and tombstones
//! streams on delete.

use crate::aggregate::{Aggregate, AggregateRoot, DomainEvent};
use crate::cache::{AggregateCache, CacheVersion, NoCache};
use crate::config::RepositoryConfig;
use crate::conflict::{ConflictResolver, RejectConflicts};
use crate::errors::{EventLogError, RepositoryError, RepositoryResult};
use crate::event_log::{
    EventData, EventLog, EventMetadata, ExpectedVersion, RecordedEvent, WriteOutcome,
};
use crate::identity::StreamIdentity;
use crate::serialization::SerializationFormat;
use crate::types::EventVersion;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What a successful [`AggregateRepository::update`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport<E> {
    /// Stream version after the commit
    pub version: EventVersion,
    /// Number of events appended
    pub appended: usize,
    /// Append attempts, the successful one included
    pub attempts: u32,
    /// Concurrent events the resolver accepted, in stream order
    pub merged: Vec<E>,
}

impl<E> UpdateReport<E> {
    /// Whether the commit needed at least one retry.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }
}

/// Loads and persists aggregates of type `A` through an [`EventLog`].
pub struct AggregateRepository<A: Aggregate, L: EventLog> {
    log: L,
    cache: Arc<dyn AggregateCache<A>>,
    resolver: Arc<dyn ConflictResolver<A::Event>>,
    config: RepositoryConfig,
}

impl<A: Aggregate, L: EventLog> AggregateRepository<A, L> {
    /// Creates a repository with no cache, a rejecting resolver and default
    /// configuration.
    pub fn new(log: L) -> Self {
        Self {
            log,
            cache: Arc::new(NoCache),
            resolver: Arc::new(RejectConflicts),
            config: RepositoryConfig::default(),
        }
    }

    /// Uses `cache` for materialised aggregates.
    #[must_use]
    pub fn with_cache<C>(mut self, cache: Arc<C>) -> Self
    where
        C: AggregateCache<A> + 'static,
    {
        self.cache = cache;
        self
    }

    /// Uses `resolver` when an update loses a concurrency race.
    #[must_use]
    pub fn with_resolver<R>(mut self, resolver: R) -> Self
    where
        R: ConflictResolver<A::Event> + 'static,
    {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    pub const fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// The underlying event log.
    pub const fn log(&self) -> &L {
        &self.log
    }

    /// Loads the latest committed state of aggregate `id`.
    #[instrument(skip_all, fields(stream = %A::stream_identity(id)))]
    pub async fn read(&self, id: &A::Id) -> RepositoryResult<AggregateRoot<A>> {
        let aggregate = self
            .cache
            .get(id, CacheVersion::Any)
            .unwrap_or_else(|| AggregateRoot::new(id.clone()));
        self.materialise(id, aggregate, None).await
    }

    /// Loads aggregate `id` as it was at exactly `version`.
    #[instrument(skip_all, fields(stream = %A::stream_identity(id), version = %version))]
    pub async fn read_at(
        &self,
        id: &A::Id,
        version: EventVersion,
    ) -> RepositoryResult<AggregateRoot<A>> {
        if let Some(cached) = self.cache.get(id, CacheVersion::Exact(version)) {
            debug!("served from cache");
            return Ok(cached);
        }
        let aggregate = self
            .cache
            .get(id, CacheVersion::Any)
            .filter(|cached| cached.version() <= version)
            .unwrap_or_else(|| AggregateRoot::new(id.clone()));
        self.materialise(id, aggregate, Some(version)).await
    }

    /// Whether aggregate `id` has a live stream.
    pub async fn exists(&self, id: &A::Id) -> RepositoryResult<bool> {
        Ok(self.log.exists(&A::stream_identity(id)).await?)
    }

    /// Commits the pending changes of `aggregate`.
    ///
    /// On a lost race the unseen events are offered to the resolver; a
    /// resolved conflict is retried at the new stream version until the
    /// configured number of attempts is used up. On success the aggregate
    /// is clean and at the committed version. On failure it is unchanged.
    pub async fn update(
        &self,
        aggregate: &mut AggregateRoot<A>,
    ) -> RepositoryResult<UpdateReport<A::Event>> {
        self.commit(aggregate, None).await
    }

    /// Like [`update`](Self::update), attaching `metadata` to every
    /// appended event.
    pub async fn update_with(
        &self,
        aggregate: &mut AggregateRoot<A>,
        metadata: EventMetadata,
    ) -> RepositoryResult<UpdateReport<A::Event>> {
        self.commit(aggregate, Some(&metadata)).await
    }

    #[instrument(
        skip_all,
        fields(stream = %aggregate.stream_identity(), version = %aggregate.version())
    )]
    async fn commit(
        &self,
        aggregate: &mut AggregateRoot<A>,
        metadata: Option<&EventMetadata>,
    ) -> RepositoryResult<UpdateReport<A::Event>> {
        let stream = aggregate.stream_identity().clone();
        if !aggregate.has_uncommitted_changes() {
            return Err(RepositoryError::NoChanges(stream));
        }
        let events = self.encode(&stream, aggregate.uncommitted_changes(), metadata)?;
        let appended = events.len();
        let max_attempts = self.config.max_try_count.into_inner();

        let mut expected = aggregate.version();
        let mut attempts = 0;
        let mut merged = Vec::new();
        loop {
            attempts += 1;
            let outcome = self
                .log
                .append(
                    &stream,
                    ExpectedVersion::from_version(expected),
                    events.clone(),
                )
                .await
                .map_err(|error| write_error(&stream, error))?;

            let actual = match outcome {
                WriteOutcome::Committed(committed) => {
                    aggregate.mark_committed(committed);
                    debug!(%committed, attempts, "changes committed");
                    return Ok(UpdateReport {
                        version: committed,
                        appended,
                        attempts,
                        merged,
                    });
                }
                WriteOutcome::Conflict { actual, .. } => actual,
            };

            let conflict = RepositoryError::VersionConflict {
                stream: stream.clone(),
                expected,
                actual,
            };
            if attempts >= max_attempts || actual <= expected {
                warn!(%expected, %actual, attempts, "version conflict, giving up");
                return Err(conflict);
            }

            let unseen = self.read_between(&stream, expected, actual).await?;
            let resolution = self
                .resolver
                .resolve(aggregate.uncommitted_changes(), &unseen);
            if !resolution.is_resolved() {
                warn!(%expected, %actual, unseen = unseen.len(), "unresolved version conflict");
                return Err(conflict);
            }
            warn!(%expected, %actual, unseen = unseen.len(), "conflict resolved, retrying");
            merged.extend(unseen);
            expected = actual;
        }
    }

    /// Tombstones aggregate `id` if its stream is still at `expected`.
    ///
    /// Deleting an already deleted aggregate succeeds.
    #[instrument(skip_all, fields(stream = %A::stream_identity(id), expected = %expected))]
    pub async fn delete(&self, id: &A::Id, expected: EventVersion) -> RepositoryResult<()> {
        let stream = A::stream_identity(id);
        let outcome = self
            .log
            .delete(&stream, ExpectedVersion::from_version(expected))
            .await;
        match outcome {
            Ok(WriteOutcome::Committed(_)) => {
                self.cache.evict(id);
                debug!("stream tombstoned");
                Ok(())
            }
            Ok(WriteOutcome::Conflict { actual, .. }) => Err(RepositoryError::VersionConflict {
                stream,
                expected,
                actual,
            }),
            Err(EventLogError::StreamDeleted(_)) => {
                self.cache.evict(id);
                info!("aggregate already deleted");
                Ok(())
            }
            Err(EventLogError::StreamNotFound(_)) => {
                Err(RepositoryError::AggregateNotFound(stream))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn materialise(
        &self,
        id: &A::Id,
        mut aggregate: AggregateRoot<A>,
        target: Option<EventVersion>,
    ) -> RepositoryResult<AggregateRoot<A>> {
        aggregate.ensure_clean()?;
        let stream = aggregate.stream_identity().clone();
        let from = aggregate.version();

        let replayed = match target {
            // Nothing to replay, but the stream must still be live.
            Some(requested) if from >= requested => self.ensure_live(&stream).await,
            _ => {
                self.read_slices(&stream, from, target, |event| aggregate.replay(&event))
                    .await
            }
        };
        if let Err(error) = replayed {
            if matches!(
                error,
                RepositoryError::AggregateNotFound(_) | RepositoryError::AggregateDeleted(_)
            ) {
                self.cache.evict(id);
            }
            return Err(error);
        }

        if let Some(requested) = target {
            if aggregate.version() != requested {
                return Err(RepositoryError::VersionNotFound {
                    stream,
                    requested,
                    actual: aggregate.version(),
                });
            }
        }
        self.cache.put(id, &aggregate);
        Ok(aggregate)
    }

    async fn ensure_live(&self, stream: &StreamIdentity) -> RepositoryResult<()> {
        self.log
            .read_forward(stream, EventVersion::initial().next(), 1)
            .await
            .map_err(|error| read_error(stream, error))?;
        Ok(())
    }

    async fn read_between(
        &self,
        stream: &StreamIdentity,
        after: EventVersion,
        through: EventVersion,
    ) -> RepositoryResult<Vec<A::Event>> {
        let mut unseen = Vec::new();
        self.read_slices(stream, after, Some(through), |event| {
            unseen.push(event);
            Ok(())
        })
        .await?;
        Ok(unseen)
    }

    /// Feeds the events after `after` (up to `until` if given) to `sink`,
    /// one bounded slice at a time.
    async fn read_slices<F>(
        &self,
        stream: &StreamIdentity,
        after: EventVersion,
        until: Option<EventVersion>,
        mut sink: F,
    ) -> RepositoryResult<()>
    where
        F: FnMut(A::Event) -> RepositoryResult<()>,
    {
        let page_size = self.config.page_size.into_inner();
        let mut position = after;
        loop {
            let count = match until {
                Some(target) if position >= target => break,
                Some(target) => {
                    let remaining = usize::try_from(target.distance_from(position))
                        .unwrap_or(usize::MAX);
                    remaining.min(page_size)
                }
                None => page_size,
            };

            let slice = self
                .log
                .read_forward(stream, position.next(), count)
                .await
                .map_err(|error| read_error(stream, error))?;
            debug!(
                from = %slice.from_version,
                events = slice.len(),
                end_of_stream = slice.end_of_stream,
                "read slice"
            );

            for recorded in &slice.events {
                if recorded.version != position.next() {
                    return Err(EventLogError::Internal(format!(
                        "stream '{stream}' returned version {} where {} was expected",
                        recorded.version,
                        position.next()
                    ))
                    .into());
                }
                sink(self.decode(stream, recorded)?)?;
                position = recorded.version;
            }

            if slice.end_of_stream || slice.is_empty() {
                break;
            }
        }
        Ok(())
    }

    fn encode(
        &self,
        stream: &StreamIdentity,
        changes: &[A::Event],
        metadata: Option<&EventMetadata>,
    ) -> RepositoryResult<Vec<EventData>> {
        let format = self.config.format;
        changes
            .iter()
            .map(|event| {
                let data = format
                    .encode(event)
                    .map_err(|error| serialization_error(stream, &error))?;
                let encoded = EventData::new(event.kind(), format.mime_type(), data);
                Ok(match metadata {
                    Some(metadata) => encoded.with_metadata(metadata.clone()),
                    None => encoded,
                })
            })
            .collect()
    }

    fn decode(
        &self,
        stream: &StreamIdentity,
        recorded: &RecordedEvent,
    ) -> RepositoryResult<A::Event> {
        SerializationFormat::from_mime_type(&recorded.content_type)
            .and_then(|format| format.decode(&recorded.data))
            .map_err(|error| serialization_error(stream, &error))
    }
}

impl<A: Aggregate, L: EventLog + fmt::Debug> fmt::Debug for AggregateRepository<A, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRepository")
            .field("aggregate_type", A::aggregate_type())
            .field("log", &self.log)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn read_error(stream: &StreamIdentity, error: EventLogError) -> RepositoryError {
    match error {
        EventLogError::StreamNotFound(_) => RepositoryError::AggregateNotFound(stream.clone()),
        EventLogError::StreamDeleted(_) => RepositoryError::AggregateDeleted(stream.clone()),
        other => other.into(),
    }
}

fn write_error(stream: &StreamIdentity, error: EventLogError) -> RepositoryError {
    match error {
        EventLogError::StreamNotFound(_) | EventLogError::StreamDeleted(_) => {
            RepositoryError::AggregateNotFound(stream.clone())
        }
        other => other.into(),
    }
}

fn serialization_error(
    stream: &StreamIdentity,
    error: &crate::serialization::SerializationError,
) -> RepositoryError {
    RepositoryError::Serialization {
        stream: stream.clone(),
        detail: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::{Counter, CounterEvent};
    use crate::cache::InMemoryAggregateCache;
    use crate::config::{MaxTryCount, PageSize};
    use crate::conflict::AcceptConflicts;
    use crate::errors::EventLogResult;
    use crate::event_log::Slice;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// A single-stream log that records every read request.
    #[derive(Default)]
    struct ScriptedLog {
        events: Mutex<Vec<RecordedEvent>>,
        deleted: Mutex<bool>,
        reads: Mutex<Vec<(u64, usize)>>,
        rivals: Mutex<Vec<EventData>>,
    }

    impl ScriptedLog {
        fn push(&self, stream: &StreamIdentity, data: EventData) -> EventVersion {
            let mut events = self.events.lock();
            let version = EventVersion::new(events.len() as u64 + 1);
            events.push(RecordedEvent::record(stream.clone(), version, data));
            version
        }

        fn reads(&self) -> Vec<(u64, usize)> {
            self.reads.lock().clone()
        }
    }

    #[async_trait]
    impl EventLog for ScriptedLog {
        async fn open(&self) -> EventLogResult<()> {
            Ok(())
        }

        async fn close(&self) -> EventLogResult<()> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            true
        }

        async fn read_forward(
            &self,
            stream: &StreamIdentity,
            start: EventVersion,
            count: usize,
        ) -> EventLogResult<Slice> {
            self.reads.lock().push((start.into_inner(), count));
            if *self.deleted.lock() {
                return Err(EventLogError::StreamDeleted(stream.clone()));
            }
            let events = self.events.lock();
            if events.is_empty() {
                return Err(EventLogError::StreamNotFound(stream.clone()));
            }
            let skip = usize::try_from(start.into_inner().saturating_sub(1)).unwrap();
            let window: Vec<_> = events.iter().skip(skip).take(count).cloned().collect();
            let end = skip + window.len() >= events.len();
            Ok(Slice::new(start, window, end))
        }

        async fn append(
            &self,
            stream: &StreamIdentity,
            expected: ExpectedVersion,
            events: Vec<EventData>,
        ) -> EventLogResult<WriteOutcome> {
            if let Some(rival) = self.rivals.lock().pop() {
                self.push(stream, rival);
            }
            let current = EventVersion::new(self.events.lock().len() as u64);
            if !expected.matches(current) {
                return Ok(WriteOutcome::Conflict {
                    expected,
                    actual: current,
                });
            }
            let mut last = current;
            for event in events {
                last = self.push(stream, event);
            }
            Ok(WriteOutcome::Committed(last))
        }

        async fn delete(
            &self,
            stream: &StreamIdentity,
            expected: ExpectedVersion,
        ) -> EventLogResult<WriteOutcome> {
            let mut deleted = self.deleted.lock();
            if *deleted {
                return Err(EventLogError::StreamDeleted(stream.clone()));
            }
            let current = EventVersion::new(self.events.lock().len() as u64);
            if current.is_initial() {
                return Err(EventLogError::StreamNotFound(stream.clone()));
            }
            if !expected.matches(current) {
                return Ok(WriteOutcome::Conflict {
                    expected,
                    actual: current,
                });
            }
            *deleted = true;
            Ok(WriteOutcome::Committed(current))
        }

        async fn exists(&self, _stream: &StreamIdentity) -> EventLogResult<bool> {
            Ok(!self.events.lock().is_empty() && !*self.deleted.lock())
        }

        async fn stream_version(
            &self,
            _stream: &StreamIdentity,
        ) -> EventLogResult<Option<EventVersion>> {
            let len = self.events.lock().len() as u64;
            Ok((len > 0).then(|| EventVersion::new(len)))
        }
    }

    fn increment(by: u32) -> EventData {
        let event = CounterEvent::Incremented(by);
        let format = SerializationFormat::Json;
        EventData::new(event.kind(), format.mime_type(), format.encode(&event).unwrap())
    }

    fn seeded(increments: &[u32]) -> Arc<ScriptedLog> {
        let log = Arc::new(ScriptedLog::default());
        let stream = Counter::stream_identity(&"c1".to_string());
        for by in increments {
            log.push(&stream, increment(*by));
        }
        log
    }

    fn paged(size: usize) -> RepositoryConfig {
        RepositoryConfig::new().with_page_size(PageSize::try_new(size).unwrap())
    }

    #[tokio::test]
    async fn read_replays_in_slices_of_page_size() {
        let log = seeded(&[1, 2, 3, 4, 5]);
        let repository =
            AggregateRepository::<Counter, _>::new(Arc::clone(&log)).with_config(paged(2));

        let counter = repository.read(&"c1".to_string()).await.unwrap();

        assert_eq!(counter.version(), EventVersion::new(5));
        assert_eq!(counter.state().total, 15);
        assert_eq!(log.reads(), vec![(1, 2), (3, 2), (5, 2)]);
    }

    #[tokio::test]
    async fn read_at_stops_at_requested_version() {
        let log = seeded(&[1, 2, 3, 4, 5]);
        let repository =
            AggregateRepository::<Counter, _>::new(Arc::clone(&log)).with_config(paged(100));

        let counter = repository
            .read_at(&"c1".to_string(), EventVersion::new(3))
            .await
            .unwrap();

        assert_eq!(counter.state().total, 6);
        assert_eq!(log.reads(), vec![(1, 3)]);
    }

    #[tokio::test]
    async fn read_at_beyond_end_reports_missing_version() {
        let repository = AggregateRepository::<Counter, _>::new(seeded(&[1, 1]));

        let error = repository
            .read_at(&"c1".to_string(), EventVersion::new(3))
            .await
            .unwrap_err();

        assert_eq!(
            error,
            RepositoryError::VersionNotFound {
                stream: Counter::stream_identity(&"c1".to_string()),
                requested: EventVersion::new(3),
                actual: EventVersion::new(2),
            }
        );
    }

    #[tokio::test]
    async fn read_at_initial_version_still_checks_the_stream() {
        let empty = AggregateRepository::<Counter, _>::new(Arc::new(ScriptedLog::default()));
        assert!(matches!(
            empty.read_at(&"c1".to_string(), EventVersion::initial()).await,
            Err(RepositoryError::AggregateNotFound(_))
        ));

        let log = seeded(&[1]);
        *log.deleted.lock() = true;
        let deleted = AggregateRepository::<Counter, _>::new(Arc::clone(&log));
        assert!(matches!(
            deleted.read_at(&"c1".to_string(), EventVersion::initial()).await,
            Err(RepositoryError::AggregateDeleted(_))
        ));
        assert_eq!(log.reads(), vec![(1, 1)]);
    }

    #[tokio::test]
    async fn read_at_initial_version_of_live_stream_is_empty() {
        let repository = AggregateRepository::<Counter, _>::new(seeded(&[4, 5]));

        let counter = repository
            .read_at(&"c1".to_string(), EventVersion::initial())
            .await
            .unwrap();

        assert_eq!(counter.version(), EventVersion::initial());
        assert_eq!(counter.state().total, 0);
    }

    /// Hands out a copy of `dirty` for every lookup.
    struct DirtyCache {
        dirty: AggregateRoot<Counter>,
    }

    impl AggregateCache<Counter> for DirtyCache {
        fn get(&self, _id: &String, _version: CacheVersion) -> Option<AggregateRoot<Counter>> {
            Some(self.dirty.clone())
        }

        fn put(&self, _id: &String, _aggregate: &AggregateRoot<Counter>) {}

        fn evict(&self, _id: &String) {}

        fn clear(&self) {}
    }

    #[tokio::test]
    async fn dirty_cached_aggregate_is_refused() {
        let log = seeded(&[1]);
        let mut dirty = AggregateRoot::<Counter>::new("c1".to_string());
        dirty.record(CounterEvent::Incremented(3)).unwrap();
        let repository = AggregateRepository::<Counter, _>::new(Arc::clone(&log))
            .with_cache(Arc::new(DirtyCache { dirty }));

        let error = repository.read(&"c1".to_string()).await.unwrap_err();

        assert!(matches!(
            error,
            RepositoryError::UncommittedChanges { pending: 1, .. }
        ));
        assert!(error.is_programmer_error());
        assert!(log.reads().is_empty());
    }

    #[tokio::test]
    async fn cached_aggregate_only_reads_the_tail() {
        let log = seeded(&[1, 2]);
        let cache = Arc::new(InMemoryAggregateCache::<Counter>::new());
        let repository =
            AggregateRepository::new(Arc::clone(&log)).with_cache(Arc::clone(&cache));
        repository.read(&"c1".to_string()).await.unwrap();

        let stream = Counter::stream_identity(&"c1".to_string());
        log.push(&stream, increment(10));
        let counter = repository.read(&"c1".to_string()).await.unwrap();

        assert_eq!(counter.state().total, 13);
        assert_eq!(log.reads().last(), Some(&(3, 100)));
    }

    #[tokio::test]
    async fn missing_and_deleted_streams_are_distinguished() {
        let empty = AggregateRepository::<Counter, _>::new(Arc::new(ScriptedLog::default()));
        assert!(matches!(
            empty.read(&"c1".to_string()).await,
            Err(RepositoryError::AggregateNotFound(_))
        ));

        let log = seeded(&[1]);
        *log.deleted.lock() = true;
        let deleted = AggregateRepository::<Counter, _>::new(log);
        assert!(matches!(
            deleted.read(&"c1".to_string()).await,
            Err(RepositoryError::AggregateDeleted(_))
        ));
    }

    #[tokio::test]
    async fn update_without_changes_is_rejected() {
        let repository = AggregateRepository::<Counter, _>::new(seeded(&[1]));
        let mut counter = repository.read(&"c1".to_string()).await.unwrap();

        assert!(matches!(
            repository.update(&mut counter).await,
            Err(RepositoryError::NoChanges(_))
        ));
    }

    #[tokio::test]
    async fn conflict_is_surfaced_with_the_default_resolver() {
        let log = seeded(&[1]);
        let repository = AggregateRepository::<Counter, _>::new(Arc::clone(&log));
        let mut counter = repository.read(&"c1".to_string()).await.unwrap();
        log.rivals.lock().push(increment(7));

        counter.record(CounterEvent::Incremented(2)).unwrap();
        let error = repository.update(&mut counter).await.unwrap_err();

        assert_eq!(
            error,
            RepositoryError::VersionConflict {
                stream: Counter::stream_identity(&"c1".to_string()),
                expected: EventVersion::new(1),
                actual: EventVersion::new(2),
            }
        );
        assert!(counter.has_uncommitted_changes());
        assert_eq!(counter.version(), EventVersion::new(1));
    }

    #[tokio::test]
    async fn resolved_conflict_is_retried_after_unseen_events() {
        let log = seeded(&[1]);
        let repository = AggregateRepository::<Counter, _>::new(Arc::clone(&log))
            .with_resolver(AcceptConflicts);
        let mut counter = repository.read(&"c1".to_string()).await.unwrap();
        log.rivals.lock().push(increment(7));

        counter.record(CounterEvent::Incremented(2)).unwrap();
        let report = repository.update(&mut counter).await.unwrap();

        assert_eq!(report.version, EventVersion::new(3));
        assert_eq!(report.attempts, 2);
        assert_eq!(report.merged, vec![CounterEvent::Incremented(7)]);
        assert!(!counter.has_uncommitted_changes());
        assert_eq!(counter.version(), EventVersion::new(3));
    }

    #[tokio::test]
    async fn retries_stop_at_max_try_count() {
        let log = seeded(&[1]);
        let repository = AggregateRepository::<Counter, _>::new(Arc::clone(&log))
            .with_resolver(AcceptConflicts)
            .with_config(
                RepositoryConfig::new().with_max_try_count(MaxTryCount::try_new(2).unwrap()),
            );
        let mut counter = repository.read(&"c1".to_string()).await.unwrap();
        log.rivals.lock().extend([increment(1), increment(1)]);

        counter.record(CounterEvent::Incremented(2)).unwrap();
        let error = repository.update(&mut counter).await.unwrap_err();

        assert!(error.is_conflict());
        assert!(log.rivals.lock().is_empty());
    }

    #[tokio::test]
    async fn deleting_twice_succeeds() {
        let log = seeded(&[1, 1]);
        let repository = AggregateRepository::<Counter, _>::new(log);

        repository
            .delete(&"c1".to_string(), EventVersion::new(2))
            .await
            .unwrap();
        repository
            .delete(&"c1".to_string(), EventVersion::new(2))
            .await
            .unwrap();
        assert!(!repository.exists(&"c1".to_string()).await.unwrap());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn conflicts_and_repeat_deletes_are_logged() {
        let log = seeded(&[1]);
        let repository = AggregateRepository::<Counter, _>::new(Arc::clone(&log));
        let mut counter = repository.read(&"c1".to_string()).await.unwrap();
        log.rivals.lock().push(increment(7));
        counter.record(CounterEvent::Reset).unwrap();
        assert!(repository.update(&mut counter).await.is_err());
        assert!(logs_contain("unresolved version conflict"));

        repository
            .delete(&"c1".to_string(), EventVersion::new(2))
            .await
            .unwrap();
        repository
            .delete(&"c1".to_string(), EventVersion::new(2))
            .await
            .unwrap();
        assert!(logs_contain("aggregate already deleted"));
    }

    #[tokio::test]
    async fn delete_with_stale_version_conflicts() {
        let repository = AggregateRepository::<Counter, _>::new(seeded(&[1, 1]));

        let error = repository
            .delete(&"c1".to_string(), EventVersion::new(1))
            .await
            .unwrap_err();
        assert!(error.is_conflict());
    }
}

//! Fault injection around any [`EventLog`].
//!
//! [`ChaosEventLog`] wraps a backend and can fail operations at random with
//! [`EventLogError::Unavailable`], or commit a competing write just before
//! an append so the append loses a real optimistic concurrency race.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use eventrepo::errors::{EventLogError, EventLogResult};
use eventrepo::event_log::{EventData, EventLog, ExpectedVersion, Slice, WriteOutcome};
use eventrepo::identity::StreamIdentity;
use eventrepo::types::EventVersion;
use nutype::nutype;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{random, Rng, SeedableRng};
use tracing::debug;

/// Probability value for fault injection rates.
///
/// Probability represents a value in the range [0.0, 1.0] where 0.0 means
/// never inject failures and 1.0 means always inject failures.
///
/// ```ignore
/// use eventrepo_testing::chaos::Probability;
///
/// let sometimes = Probability::try_new(0.5).unwrap();
/// assert!(Probability::try_new(1.5).is_err());
/// ```
#[nutype(
    validate(greater_or_equal = 0.0, less_or_equal = 1.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, Into)
)]
pub struct Probability(f32);

type RivalFactory = Arc<dyn Fn() -> EventData + Send + Sync>;

/// What a [`ChaosEventLog`] injects.
#[derive(Clone, Default)]
pub struct ChaosConfig {
    deterministic_seed: Option<u64>,
    failure_probability: Option<Probability>,
    competing_writes: usize,
    rival: Option<RivalFactory>,
}

impl ChaosConfig {
    /// A configuration with a fixed RNG seed.
    pub fn deterministic() -> Self {
        Self {
            deterministic_seed: Some(0),
            ..Self::default()
        }
    }

    /// Fails each operation with `probability`.
    #[must_use]
    pub fn with_failure_probability(mut self, probability: Probability) -> Self {
        self.failure_probability = Some(probability);
        self
    }

    /// Commits `rival()` to the target stream before each of the next
    /// `count` appends.
    #[must_use]
    pub fn with_competing_writes<F>(mut self, count: usize, rival: F) -> Self
    where
        F: Fn() -> EventData + Send + Sync + 'static,
    {
        self.competing_writes = count;
        self.rival = Some(Arc::new(rival));
        self
    }
}

impl fmt::Debug for ChaosConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaosConfig")
            .field("deterministic_seed", &self.deterministic_seed)
            .field("failure_probability", &self.failure_probability)
            .field("competing_writes", &self.competing_writes)
            .finish_non_exhaustive()
    }
}

/// Adds `.with_chaos(config)` to every event log.
pub trait ChaosEventLogExt: Sized {
    /// Wraps `self` in a [`ChaosEventLog`].
    fn with_chaos(self, config: ChaosConfig) -> ChaosEventLog<Self>;
}

impl<L: EventLog> ChaosEventLogExt for L {
    fn with_chaos(self, config: ChaosConfig) -> ChaosEventLog<Self> {
        ChaosEventLog::new(self, config)
    }
}

/// An event log that injects failures and competing writes.
pub struct ChaosEventLog<L> {
    log: L,
    config: ChaosConfig,
    rivals_left: AtomicUsize,
    rng: Mutex<StdRng>,
}

impl<L> ChaosEventLog<L> {
    /// Wraps `log`.
    pub fn new(log: L, config: ChaosConfig) -> Self {
        let rng = match config.deterministic_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(random()),
        };

        Self {
            log,
            rivals_left: AtomicUsize::new(config.competing_writes),
            config,
            rng: Mutex::new(rng),
        }
    }

    /// The wrapped log.
    pub const fn inner(&self) -> &L {
        &self.log
    }

    /// Competing writes still to be injected.
    pub fn competing_writes_left(&self) -> usize {
        self.rivals_left.load(Ordering::Acquire)
    }

    fn should_fail(&self) -> bool {
        let Some(probability) = self.config.failure_probability else {
            return false;
        };
        let probability: f32 = probability.into();
        if probability <= 0.0 {
            return false;
        }
        if probability >= 1.0 {
            return true;
        }
        self.rng.lock().random_bool(f64::from(probability))
    }

    fn take_rival(&self) -> Option<EventData> {
        let rival = self.config.rival.as_ref()?;
        self.rivals_left
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
            .ok()
            .map(|_| rival())
    }

    fn injected(operation: &str) -> EventLogError {
        EventLogError::Unavailable(format!("chaos: injected {operation} failure"))
    }
}

impl<L: fmt::Debug> fmt::Debug for ChaosEventLog<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaosEventLog")
            .field("log", &self.log)
            .field("config", &self.config)
            .field("rivals_left", &self.rivals_left)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<L: EventLog> EventLog for ChaosEventLog<L> {
    async fn open(&self) -> EventLogResult<()> {
        self.log.open().await
    }

    async fn close(&self) -> EventLogResult<()> {
        self.log.close().await
    }

    fn is_open(&self) -> bool {
        self.log.is_open()
    }

    async fn read_forward(
        &self,
        stream: &StreamIdentity,
        start: EventVersion,
        count: usize,
    ) -> EventLogResult<Slice> {
        if self.should_fail() {
            return Err(Self::injected("read"));
        }
        self.log.read_forward(stream, start, count).await
    }

    async fn append(
        &self,
        stream: &StreamIdentity,
        expected: ExpectedVersion,
        events: Vec<EventData>,
    ) -> EventLogResult<WriteOutcome> {
        if self.should_fail() {
            return Err(Self::injected("append"));
        }
        if let Some(rival) = self.take_rival() {
            let outcome = self
                .log
                .append(stream, ExpectedVersion::Any, vec![rival])
                .await?;
            debug!(%stream, ?outcome, "injected competing write");
        }
        self.log.append(stream, expected, events).await
    }

    async fn delete(
        &self,
        stream: &StreamIdentity,
        expected: ExpectedVersion,
    ) -> EventLogResult<WriteOutcome> {
        if self.should_fail() {
            return Err(Self::injected("delete"));
        }
        self.log.delete(stream, expected).await
    }

    async fn exists(&self, stream: &StreamIdentity) -> EventLogResult<bool> {
        self.log.exists(stream).await
    }

    async fn stream_version(
        &self,
        stream: &StreamIdentity,
    ) -> EventLogResult<Option<EventVersion>> {
        self.log.stream_version(stream).await
    }
}

//! A behavioural contract every [`EventLog`] backend must satisfy.
//!
//! Each scenario is an async function returning [`ContractTestResult`], so a
//! failure names the scenario and what was observed. The
//! [`event_log_contract_tests!`](crate::event_log_contract_tests) macro
//! expands to one `#[tokio::test]` per scenario for a given backend factory.

use std::fmt;
use std::sync::Arc;

use eventrepo::errors::EventLogError;
use eventrepo::event_log::{EventData, EventLog, ExpectedVersion, WriteOutcome};
use eventrepo::identity::StreamIdentity;
use eventrepo::types::{AggregateType, EventVersion};
use uuid::Uuid;

/// A violated contract scenario.
#[derive(Debug)]
pub struct ContractTestFailure {
    scenario: &'static str,
    detail: String,
}

impl ContractTestFailure {
    fn new(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self {
            scenario,
            detail: detail.into(),
        }
    }

    fn log_error(scenario: &'static str, operation: &'static str, error: &EventLogError) -> Self {
        Self::new(
            scenario,
            format!("{operation} operation returned unexpected error: {error}"),
        )
    }

    fn assertion(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self::new(scenario, detail)
    }
}

impl fmt::Display for ContractTestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.scenario, self.detail)
    }
}

impl std::error::Error for ContractTestFailure {}

/// Outcome of one contract scenario.
pub type ContractTestResult = Result<(), ContractTestFailure>;

fn contract_stream(
    scenario: &'static str,
    label: &str,
) -> Result<StreamIdentity, ContractTestFailure> {
    // Unique per run so backends with shared storage can run scenarios in parallel.
    let aggregate_type = AggregateType::try_new("Contract").map_err(|error| {
        ContractTestFailure::assertion(scenario, format!("invalid aggregate type: {error}"))
    })?;
    let id = format!("{scenario}.{label}.{}", Uuid::now_v7());
    Ok(StreamIdentity::of(&aggregate_type, "id", &id))
}

fn contract_event(n: usize) -> EventData {
    EventData::new(
        "ContractTestEvent",
        "application/json",
        format!(r#"{{"n":{n}}}"#).into_bytes(),
    )
}

fn contract_events(range: std::ops::Range<usize>) -> Vec<EventData> {
    range.map(contract_event).collect()
}

async fn append_ok<L: EventLog + ?Sized>(
    scenario: &'static str,
    log: &L,
    stream: &StreamIdentity,
    expected: ExpectedVersion,
    events: Vec<EventData>,
) -> Result<EventVersion, ContractTestFailure> {
    match log.append(stream, expected, events).await {
        Ok(WriteOutcome::Committed(version)) => Ok(version),
        Ok(outcome) => Err(ContractTestFailure::assertion(
            scenario,
            format!("expected append to commit, observed {outcome:?}"),
        )),
        Err(error) => Err(ContractTestFailure::log_error(scenario, "append", &error)),
    }
}

fn expect_eq<T: PartialEq + fmt::Debug>(
    scenario: &'static str,
    what: &str,
    observed: T,
    expected: T,
) -> ContractTestResult {
    if observed == expected {
        Ok(())
    } else {
        Err(ContractTestFailure::assertion(
            scenario,
            format!("{what}: expected {expected:?}, observed {observed:?}"),
        ))
    }
}

/// Appended events read back in order with versions `1..=n`.
pub async fn test_basic_append_and_read<F, L>(make_log: F) -> ContractTestResult
where
    F: Fn() -> L,
    L: EventLog,
{
    const SCENARIO: &str = "basic_append_and_read";

    let log = make_log();
    let stream = contract_stream(SCENARIO, "stream")?;

    let version = append_ok(
        SCENARIO,
        &log,
        &stream,
        ExpectedVersion::NoStream,
        contract_events(0..3),
    )
    .await?;
    expect_eq(SCENARIO, "version after append", version, EventVersion::new(3))?;

    let slice = log
        .read_forward(&stream, EventVersion::new(1), 10)
        .await
        .map_err(|error| ContractTestFailure::log_error(SCENARIO, "read_forward", &error))?;
    let versions: Vec<u64> = slice.events.iter().map(|e| e.version.into_inner()).collect();
    expect_eq(SCENARIO, "read versions", versions, vec![1, 2, 3])?;
    expect_eq(SCENARIO, "end_of_stream", slice.end_of_stream, true)?;
    expect_eq(
        SCENARIO,
        "payload of first event",
        slice.events[0].data.clone(),
        contract_event(0).data,
    )?;

    let exists = log
        .exists(&stream)
        .await
        .map_err(|error| ContractTestFailure::log_error(SCENARIO, "exists", &error))?;
    expect_eq(SCENARIO, "exists", exists, true)
}

/// Slices honour `count` and report the end of the stream.
pub async fn test_paginated_reads<F, L>(make_log: F) -> ContractTestResult
where
    F: Fn() -> L,
    L: EventLog,
{
    const SCENARIO: &str = "paginated_reads";

    let log = make_log();
    let stream = contract_stream(SCENARIO, "stream")?;
    let _ = append_ok(
        SCENARIO,
        &log,
        &stream,
        ExpectedVersion::NoStream,
        contract_events(0..5),
    )
    .await?;

    let mut start = EventVersion::new(1);
    let mut pages = Vec::new();
    loop {
        let slice = log
            .read_forward(&stream, start, 2)
            .await
            .map_err(|error| ContractTestFailure::log_error(SCENARIO, "read_forward", &error))?;
        pages.push(slice.len());
        if slice.end_of_stream {
            break;
        }
        if pages.len() > 5 {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "end_of_stream never reported",
            ));
        }
        start = slice.next_version;
    }
    expect_eq(SCENARIO, "page sizes", pages, vec![2, 2, 1])
}

/// A stale expectation is a typed conflict carrying the actual version.
pub async fn test_version_conflict_reports_actual<F, L>(make_log: F) -> ContractTestResult
where
    F: Fn() -> L,
    L: EventLog,
{
    const SCENARIO: &str = "version_conflict_reports_actual";

    let log = make_log();
    let stream = contract_stream(SCENARIO, "stream")?;
    let _ = append_ok(
        SCENARIO,
        &log,
        &stream,
        ExpectedVersion::NoStream,
        contract_events(0..2),
    )
    .await?;

    let outcome = log
        .append(
            &stream,
            ExpectedVersion::Exact(EventVersion::new(1)),
            contract_events(2..3),
        )
        .await
        .map_err(|error| ContractTestFailure::log_error(SCENARIO, "append", &error))?;
    expect_eq(
        SCENARIO,
        "stale append",
        outcome,
        WriteOutcome::Conflict {
            expected: ExpectedVersion::Exact(EventVersion::new(1)),
            actual: EventVersion::new(2),
        },
    )?;

    let version = log
        .stream_version(&stream)
        .await
        .map_err(|error| ContractTestFailure::log_error(SCENARIO, "stream_version", &error))?;
    expect_eq(
        SCENARIO,
        "version after conflict",
        version,
        Some(EventVersion::new(2)),
    )
}

/// Writes to one stream never show up in another.
pub async fn test_stream_isolation<F, L>(make_log: F) -> ContractTestResult
where
    F: Fn() -> L,
    L: EventLog,
{
    const SCENARIO: &str = "stream_isolation";

    let log = make_log();
    let left = contract_stream(SCENARIO, "left")?;
    let right = contract_stream(SCENARIO, "right")?;
    let _ = append_ok(
        SCENARIO,
        &log,
        &left,
        ExpectedVersion::NoStream,
        contract_events(0..2),
    )
    .await?;
    let _ = append_ok(
        SCENARIO,
        &log,
        &right,
        ExpectedVersion::NoStream,
        contract_events(0..1),
    )
    .await?;

    let right_slice = log
        .read_forward(&right, EventVersion::new(1), 10)
        .await
        .map_err(|error| ContractTestFailure::log_error(SCENARIO, "read_forward", &error))?;
    expect_eq(SCENARIO, "right stream length", right_slice.len(), 1)?;
    if right_slice.events.iter().any(|event| event.stream != right) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "read of right stream returned events from another stream",
        ));
    }
    Ok(())
}

/// Operations on a stream that never existed report `StreamNotFound`.
pub async fn test_missing_stream<F, L>(make_log: F) -> ContractTestResult
where
    F: Fn() -> L,
    L: EventLog,
{
    const SCENARIO: &str = "missing_stream";

    let log = make_log();
    let stream = contract_stream(SCENARIO, "ghost")?;
    let not_found = Err(EventLogError::StreamNotFound(stream.clone()));

    expect_eq(
        SCENARIO,
        "read of missing stream",
        log.read_forward(&stream, EventVersion::new(1), 10)
            .await
            .map(|_| ()),
        not_found.clone(),
    )?;
    expect_eq(
        SCENARIO,
        "delete of missing stream",
        log.delete(&stream, ExpectedVersion::Any).await.map(|_| ()),
        not_found,
    )?;
    expect_eq(
        SCENARIO,
        "stream_version of missing stream",
        log.stream_version(&stream).await.ok().flatten(),
        None,
    )
}

/// A tombstoned stream refuses reads, appends and deletes with `StreamDeleted`.
pub async fn test_tombstone_is_permanent<F, L>(make_log: F) -> ContractTestResult
where
    F: Fn() -> L,
    L: EventLog,
{
    const SCENARIO: &str = "tombstone_is_permanent";

    let log = make_log();
    let stream = contract_stream(SCENARIO, "stream")?;
    let _ = append_ok(
        SCENARIO,
        &log,
        &stream,
        ExpectedVersion::NoStream,
        contract_events(0..2),
    )
    .await?;

    let outcome = log
        .delete(&stream, ExpectedVersion::Exact(EventVersion::new(2)))
        .await
        .map_err(|error| ContractTestFailure::log_error(SCENARIO, "delete", &error))?;
    expect_eq(
        SCENARIO,
        "delete",
        outcome,
        WriteOutcome::Committed(EventVersion::new(2)),
    )?;

    let deleted = Err(EventLogError::StreamDeleted(stream.clone()));
    expect_eq(
        SCENARIO,
        "read after delete",
        log.read_forward(&stream, EventVersion::new(1), 10)
            .await
            .map(|_| ()),
        deleted.clone(),
    )?;
    expect_eq(
        SCENARIO,
        "append after delete",
        log.append(&stream, ExpectedVersion::Any, contract_events(2..3))
            .await
            .map(|_| ()),
        deleted.clone(),
    )?;
    expect_eq(
        SCENARIO,
        "second delete",
        log.delete(&stream, ExpectedVersion::Any).await.map(|_| ()),
        deleted,
    )?;
    expect_eq(
        SCENARIO,
        "exists after delete",
        log.exists(&stream).await.ok(),
        Some(false),
    )
}

/// Of concurrent appends against the same expected version exactly one wins.
pub async fn test_concurrent_appends_single_winner<F, L>(make_log: F) -> ContractTestResult
where
    F: Fn() -> L,
    L: EventLog + 'static,
{
    const SCENARIO: &str = "concurrent_appends_single_winner";
    const RACERS: usize = 8;

    let log = Arc::new(make_log());
    let stream = contract_stream(SCENARIO, "stream")?;
    let _ = append_ok(
        SCENARIO,
        log.as_ref(),
        &stream,
        ExpectedVersion::NoStream,
        contract_events(0..1),
    )
    .await?;

    let barrier = Arc::new(tokio::sync::Barrier::new(RACERS));
    let handles: Vec<_> = (0..RACERS)
        .map(|n| {
            let log = Arc::clone(&log);
            let stream = stream.clone();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                let _ = barrier.wait().await;
                log.append(
                    &stream,
                    ExpectedVersion::Exact(EventVersion::new(1)),
                    vec![contract_event(n + 1)],
                )
                .await
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        let outcome = handle
            .await
            .map_err(|error| ContractTestFailure::assertion(SCENARIO, error.to_string()))?
            .map_err(|error| ContractTestFailure::log_error(SCENARIO, "append", &error))?;
        match outcome {
            WriteOutcome::Committed(_) => winners += 1,
            WriteOutcome::Conflict { actual, .. } => {
                expect_eq(SCENARIO, "conflict actual", actual, EventVersion::new(2))?;
            }
        }
    }
    expect_eq(SCENARIO, "winners", winners, 1)
}

/// Runs every event log contract scenario as a `#[tokio::test]`.
///
/// ```rust,ignore
/// event_log_contract_tests! {
///     suite = in_memory,
///     make_log = eventrepo_memory::InMemoryEventLog::new,
/// }
/// ```
#[macro_export]
macro_rules! event_log_contract_tests {
    (suite = $suite:ident, make_log = $make_log:expr $(,)?) => {
        #[allow(non_snake_case)]
        mod $suite {
            use $crate::contract::{
                test_basic_append_and_read, test_concurrent_appends_single_winner,
                test_missing_stream, test_paginated_reads, test_stream_isolation,
                test_tombstone_is_permanent, test_version_conflict_reports_actual,
            };

            #[tokio::test(flavor = "multi_thread")]
            async fn basic_append_and_read_contract() {
                test_basic_append_and_read($make_log)
                    .await
                    .expect("event log contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn paginated_reads_contract() {
                test_paginated_reads($make_log)
                    .await
                    .expect("event log contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn version_conflict_reports_actual_contract() {
                test_version_conflict_reports_actual($make_log)
                    .await
                    .expect("event log contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn stream_isolation_contract() {
                test_stream_isolation($make_log)
                    .await
                    .expect("event log contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn missing_stream_contract() {
                test_missing_stream($make_log)
                    .await
                    .expect("event log contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn tombstone_is_permanent_contract() {
                test_tombstone_is_permanent($make_log)
                    .await
                    .expect("event log contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn concurrent_appends_single_winner_contract() {
                test_concurrent_appends_single_winner($make_log)
                    .await
                    .expect("event log contract failed");
            }
        }
    };
}

pub use event_log_contract_tests;

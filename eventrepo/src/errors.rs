//! Error types for `EventRepo`.
//!
//! Errors are split by layer:
//!
//! - **`EventLogError`**: fatal failures reported by an [`EventLog`](crate::event_log::EventLog)
//!   implementation. Version conflicts are *not* errors at this layer; they are
//!   returned as [`WriteOutcome::Conflict`](crate::event_log::WriteOutcome) so the
//!   repository can drive its retry loop by iteration.
//! - **`RepositoryError`**: everything the repository surfaces to its caller.
//!   Each kind is surfaced untransformed; the repository never downgrades one
//!   kind into another.
//!
//! # Handling strategy
//!
//! | Kind | Retried here | Caller action |
//! |---|---|---|
//! | `AggregateNotFound` | no | create the aggregate first |
//! | `AggregateDeleted` | no | stream is tombstoned, stop |
//! | `VersionNotFound` | no | request an existing version |
//! | `VersionConflict` | up to `max_try_count` | re-read and re-apply the command |
//! | `UncommittedChanges`, `NoChanges`, `UnhandledEvent` | never | programming error |

use crate::identity::StreamIdentity;
use crate::types::EventVersion;
use thiserror::Error;

/// Fatal errors reported by an event log implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventLogError {
    /// The stream does not exist.
    #[error("Stream '{0}' not found")]
    StreamNotFound(StreamIdentity),

    /// The stream exists but carries a tombstone.
    #[error("Stream '{0}' has been deleted")]
    StreamDeleted(StreamIdentity),

    /// The log was used before `open` or after `close`.
    #[error("Event log is not open")]
    NotOpen,

    /// The log backend is temporarily unavailable.
    #[error("Event log unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal error occurred.
    #[error("Internal event log error: {0}")]
    Internal(String),
}

/// Result type for event log operations.
pub type EventLogResult<T> = Result<T, EventLogError>;

/// Errors surfaced by the [`AggregateRepository`](crate::repository::AggregateRepository).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The aggregate's stream does not exist.
    #[error("Aggregate '{0}' not found")]
    AggregateNotFound(StreamIdentity),

    /// The aggregate's stream has been tombstoned.
    #[error("Aggregate '{0}' has been deleted")]
    AggregateDeleted(StreamIdentity),

    /// A specific historical version was requested that the stream does not contain.
    #[error("Aggregate '{stream}' has no version {requested}; stream ends at version {actual}")]
    VersionNotFound {
        /// The aggregate stream
        stream: StreamIdentity,
        /// The version that was requested
        requested: EventVersion,
        /// The last version the stream contains
        actual: EventVersion,
    },

    /// The optimistic concurrency check failed and could not be resolved.
    #[error("Version conflict on aggregate '{stream}': expected {expected}, but current is {actual}")]
    VersionConflict {
        /// The aggregate stream
        stream: StreamIdentity,
        /// The version the writer expected
        expected: EventVersion,
        /// The version the log actually holds
        actual: EventVersion,
    },

    /// Replay or reload was attempted on an aggregate holding pending changes.
    #[error("Aggregate '{stream}' has {pending} uncommitted change(s); refusing to replay")]
    UncommittedChanges {
        /// The aggregate stream
        stream: StreamIdentity,
        /// Number of pending changes
        pending: usize,
    },

    /// An update was requested for an aggregate with nothing to commit.
    #[error("Aggregate '{0}' has no uncommitted changes to save")]
    NoChanges(StreamIdentity),

    /// A replayed event has no registered handler on the aggregate type.
    #[error("Aggregate type '{aggregate_type}' has no handler for event kind '{kind}'")]
    UnhandledEvent {
        /// The aggregate type name
        aggregate_type: String,
        /// The unhandled event kind
        kind: String,
    },

    /// An event payload could not be encoded or decoded.
    #[error("Serialization error on aggregate '{stream}': {detail}")]
    Serialization {
        /// The aggregate stream
        stream: StreamIdentity,
        /// Description of the failure
        detail: String,
    },

    /// The event log failed for a reason unrelated to the aggregate's state.
    #[error("Event log error: {0}")]
    EventLog(#[from] EventLogError),
}

impl RepositoryError {
    /// Whether this error signals misuse of the API rather than a business condition.
    pub const fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::UncommittedChanges { .. } | Self::NoChanges(_) | Self::UnhandledEvent { .. }
        )
    }

    /// Whether this error is an unresolved optimistic concurrency conflict.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Error raised while building an [`EventHandlers`](crate::aggregate::EventHandlers) table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerRegistrationError {
    /// Two handlers were registered for the same event kind.
    #[error("Duplicate handler registration for event kind '{0}'")]
    DuplicateKind(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AggregateType;

    fn vendor_stream() -> StreamIdentity {
        StreamIdentity::of(
            &AggregateType::try_new("Vendor").unwrap(),
            "vendorId",
            "42",
        )
    }

    #[test]
    fn version_conflict_names_expected_and_actual() {
        let error = RepositoryError::VersionConflict {
            stream: vendor_stream(),
            expected: EventVersion::new(1),
            actual: EventVersion::new(2),
        };
        insta::assert_snapshot!(
            error.to_string(),
            @"Version conflict on aggregate 'Vendor-42': expected 1, but current is 2"
        );
    }

    #[test]
    fn version_not_found_message() {
        let error = RepositoryError::VersionNotFound {
            stream: vendor_stream(),
            requested: EventVersion::new(3),
            actual: EventVersion::new(2),
        };
        insta::assert_snapshot!(
            error.to_string(),
            @"Aggregate 'Vendor-42' has no version 3; stream ends at version 2"
        );
    }

    #[test]
    fn log_errors_convert_without_losing_detail() {
        let error: RepositoryError = EventLogError::Unavailable("disk full".into()).into();
        assert_eq!(
            error,
            RepositoryError::EventLog(EventLogError::Unavailable("disk full".into()))
        );
        insta::assert_snapshot!(error.to_string(), @"Event log error: Event log unavailable: disk full");
    }

    #[test]
    fn misuse_kinds_are_flagged() {
        assert!(RepositoryError::NoChanges(vendor_stream()).is_programmer_error());
        assert!(RepositoryError::UncommittedChanges {
            stream: vendor_stream(),
            pending: 2
        }
        .is_programmer_error());
        assert!(!RepositoryError::AggregateNotFound(vendor_stream()).is_programmer_error());
        assert!(RepositoryError::VersionConflict {
            stream: vendor_stream(),
            expected: EventVersion::new(0),
            actual: EventVersion::new(1),
        }
        .is_conflict());
    }
}

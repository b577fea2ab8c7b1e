//! Conflict resolution policy.
//!
//! When an update loses the optimistic concurrency race, the repository
//! reads the committed events the writer had not seen and asks a
//! [`ConflictResolver`] whether the writer's pending changes are still
//! compatible with them. A resolved conflict is retried against the new
//! stream version: the pending changes are appended *after* the unseen
//! events and the aggregate's in-memory state is not refolded. Callers that
//! need the merged state re-read the aggregate.

use crate::aggregate::DomainEvent;
use std::collections::HashSet;
use std::fmt;

/// Outcome of a conflict check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Pending changes are compatible; the append may be retried.
    Resolved,
    /// Pending changes conflict; surface a version conflict.
    Unresolved,
}

impl ConflictResolution {
    /// Whether the conflict was resolved.
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved)
    }
}

impl From<bool> for ConflictResolution {
    fn from(resolved: bool) -> Self {
        if resolved {
            Self::Resolved
        } else {
            Self::Unresolved
        }
    }
}

/// Decides whether pending changes survive concurrent commits.
pub trait ConflictResolver<E>: Send + Sync {
    /// Compares `uncommitted` local changes with `unseen` committed events.
    fn resolve(&self, uncommitted: &[E], unseen: &[E]) -> ConflictResolution;
}

impl<E, F> ConflictResolver<E> for F
where
    F: Fn(&[E], &[E]) -> ConflictResolution + Send + Sync,
{
    fn resolve(&self, uncommitted: &[E], unseen: &[E]) -> ConflictResolution {
        self(uncommitted, unseen)
    }
}

/// The default policy: every conflict is unresolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectConflicts;

impl<E> ConflictResolver<E> for RejectConflicts {
    fn resolve(&self, _uncommitted: &[E], _unseen: &[E]) -> ConflictResolution {
        ConflictResolution::Unresolved
    }
}

/// Accepts every conflict; pending changes are always appended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptConflicts;

impl<E> ConflictResolver<E> for AcceptConflicts {
    fn resolve(&self, _uncommitted: &[E], _unseen: &[E]) -> ConflictResolution {
        ConflictResolution::Resolved
    }
}

/// Resolves when every local and unseen event is of a commutative kind.
///
/// Suited to additive events whose order does not matter, such as
/// `ItemAdded` on a collection.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CommutativeKinds {
    kinds: HashSet<&'static str>,
}

impl CommutativeKinds {
    /// Declares `kinds` as mutually commutative.
    pub fn new(kinds: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    /// Whether `kind` was declared commutative.
    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains(kind)
    }
}

impl fmt::Debug for CommutativeKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.kinds.iter().collect();
        kinds.sort_unstable();
        f.debug_tuple("CommutativeKinds").field(&kinds).finish()
    }
}

impl<E: DomainEvent> ConflictResolver<E> for CommutativeKinds {
    fn resolve(&self, uncommitted: &[E], unseen: &[E]) -> ConflictResolution {
        uncommitted
            .iter()
            .chain(unseen)
            .all(|event| self.contains(event.kind()))
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::CounterEvent;

    #[test]
    fn reject_is_never_resolved() {
        let outcome = RejectConflicts.resolve(
            &[CounterEvent::Incremented(1)],
            &[CounterEvent::Incremented(2)],
        );
        assert_eq!(outcome, ConflictResolution::Unresolved);
    }

    #[test]
    fn accept_is_always_resolved() {
        let outcome = AcceptConflicts.resolve(&[CounterEvent::Reset], &[CounterEvent::Reset]);
        assert!(outcome.is_resolved());
    }

    #[test]
    fn commutative_kinds_require_every_event_to_commute() {
        let policy = CommutativeKinds::new(["Incremented"]);

        assert_eq!(
            policy.resolve(
                &[CounterEvent::Incremented(1)],
                &[CounterEvent::Incremented(2), CounterEvent::Incremented(3)]
            ),
            ConflictResolution::Resolved
        );
        assert_eq!(
            policy.resolve(&[CounterEvent::Incremented(1)], &[CounterEvent::Reset]),
            ConflictResolution::Unresolved
        );
        assert_eq!(
            policy.resolve(&[CounterEvent::Reset], &[CounterEvent::Incremented(1)]),
            ConflictResolution::Unresolved
        );
    }

    #[test]
    fn closures_are_resolvers() {
        let only_small_batches = |mine: &[CounterEvent], theirs: &[CounterEvent]| {
            ConflictResolution::from(mine.len() + theirs.len() <= 2)
        };
        assert!(only_small_batches
            .resolve(&[CounterEvent::Reset], &[CounterEvent::Reset])
            .is_resolved());
        assert!(!only_small_batches
            .resolve(&[CounterEvent::Reset], &[CounterEvent::Reset, CounterEvent::Reset])
            .is_resolved());
    }
}

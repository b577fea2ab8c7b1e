//! Aggregate model: domain events, the event dispatch table and the
//! [`AggregateRoot`] that tracks committed version and pending changes.
//!
//! Event application is dispatched through an explicit table that maps an
//! event-kind tag to a handler function. The table is built once per
//! aggregate type (typically inside a `LazyLock`) and is the only way an
//! event reaches aggregate state:
//!
//! ```rust,ignore
//! static HANDLERS: LazyLock<EventHandlers<Vendor>> = LazyLock::new(|| {
//!     EventHandlers::<Vendor>::new()
//!         .on("VendorCreated", Vendor::created)
//!         .and_then(|h| h.on("VendorRenamed", Vendor::renamed))
//!         .expect("vendor handlers are registered once")
//! });
//! ```

use crate::entity::RootRef;
use crate::errors::{HandlerRegistrationError, RepositoryError, RepositoryResult};
use crate::identity::{AggregateId, StreamIdentity};
use crate::types::{AggregateType, EventVersion};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// An immutable fact that happened to one aggregate.
pub trait DomainEvent:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The event-kind tag used for dispatch and stored alongside the payload.
    fn kind(&self) -> &'static str;
}

/// A handler that folds one event into aggregate state.
pub type EventHandler<A> = fn(&mut A, &<A as Aggregate>::Event);

/// Domain state of one aggregate type.
pub trait Aggregate: Clone + fmt::Debug + Send + Sync + Sized + 'static {
    /// Identifier type of this aggregate.
    type Id: AggregateId + Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Event type produced and consumed by this aggregate.
    type Event: DomainEvent;

    /// The category name; one stream exists per (type, id).
    fn aggregate_type() -> &'static AggregateType;

    /// Factory for an empty aggregate that has seen no events.
    fn empty(id: &Self::Id) -> Self;

    /// The dispatch table for this aggregate type.
    fn handlers() -> &'static EventHandlers<Self>;

    /// Derives the stream identity for `id`.
    fn stream_identity(id: &Self::Id) -> StreamIdentity {
        StreamIdentity::for_id(Self::aggregate_type(), id)
    }
}

/// Dispatch table from event-kind tag to handler.
pub struct EventHandlers<A: Aggregate> {
    handlers: HashMap<&'static str, EventHandler<A>>,
}

impl<A: Aggregate> EventHandlers<A> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `kind`. Registering a kind twice is an error.
    pub fn on(
        mut self,
        kind: &'static str,
        handler: EventHandler<A>,
    ) -> Result<Self, HandlerRegistrationError> {
        if self.handlers.insert(kind, handler).is_some() {
            return Err(HandlerRegistrationError::DuplicateKind(kind));
        }
        Ok(self)
    }

    /// Whether a handler exists for `kind`.
    pub fn handles(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered event kinds, in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Applies `event` to `state` through its registered handler.
    pub fn dispatch(&self, state: &mut A, event: &A::Event) -> RepositoryResult<()> {
        let kind = event.kind();
        let handler = self
            .handlers
            .get(kind)
            .ok_or_else(|| RepositoryError::UnhandledEvent {
                aggregate_type: A::aggregate_type().to_string(),
                kind: kind.to_owned(),
            })?;
        handler(state, event);
        Ok(())
    }
}

impl<A: Aggregate> Default for EventHandlers<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Aggregate> fmt::Debug for EventHandlers<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.kinds().collect();
        kinds.sort_unstable();
        f.debug_struct("EventHandlers").field("kinds", &kinds).finish()
    }
}

/// In-memory reconstruction of one aggregate stream.
///
/// Tracks the last committed `version` and the `uncommitted_changes`
/// recorded since the aggregate was loaded. Recorded changes are applied to
/// state immediately, so later business operations in the same unit of work
/// observe them.
#[derive(Debug, Clone)]
pub struct AggregateRoot<A: Aggregate> {
    id: A::Id,
    stream: StreamIdentity,
    version: EventVersion,
    state: A,
    uncommitted: Vec<A::Event>,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Creates an empty aggregate at the initial version.
    pub fn new(id: A::Id) -> Self {
        let stream = A::stream_identity(&id);
        let state = A::empty(&id);
        Self {
            id,
            stream,
            version: EventVersion::initial(),
            state,
            uncommitted: Vec::new(),
        }
    }

    /// The aggregate id.
    pub const fn id(&self) -> &A::Id {
        &self.id
    }

    /// The stream this aggregate lives in.
    pub const fn stream_identity(&self) -> &StreamIdentity {
        &self.stream
    }

    /// Last committed version reflected in state.
    pub const fn version(&self) -> EventVersion {
        self.version
    }

    /// Current domain state, including applied uncommitted changes.
    pub const fn state(&self) -> &A {
        &self.state
    }

    /// Events recorded since load or last commit, in order.
    pub fn uncommitted_changes(&self) -> &[A::Event] {
        &self.uncommitted
    }

    /// Whether any change is pending.
    pub fn has_uncommitted_changes(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    /// A non-owning reference to this root for child entities.
    pub fn root_ref(&self) -> RootRef<A> {
        RootRef::new(self.id.clone())
    }

    /// Records a new change: applies it to state and queues it for commit.
    pub fn record(&mut self, event: A::Event) -> RepositoryResult<()> {
        A::handlers().dispatch(&mut self.state, &event)?;
        self.uncommitted.push(event);
        Ok(())
    }

    /// Folds one committed event into state and advances the version by one.
    ///
    /// Refused while changes are pending: replaying underneath local
    /// changes would reorder history.
    pub fn replay(&mut self, event: &A::Event) -> RepositoryResult<()> {
        self.ensure_clean()?;
        A::handlers().dispatch(&mut self.state, event)?;
        self.version = self.version.next();
        Ok(())
    }

    /// Fails with [`RepositoryError::UncommittedChanges`] if changes are pending.
    pub fn ensure_clean(&self) -> RepositoryResult<()> {
        if self.uncommitted.is_empty() {
            Ok(())
        } else {
            Err(RepositoryError::UncommittedChanges {
                stream: self.stream.clone(),
                pending: self.uncommitted.len(),
            })
        }
    }

    /// Clears pending changes and adopts the version the log committed.
    pub(crate) fn mark_committed(&mut self, version: EventVersion) {
        self.uncommitted.clear();
        self.version = version;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::LazyLock;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub enum CounterEvent {
        Incremented(u32),
        Reset,
        Unregistered,
    }

    impl DomainEvent for CounterEvent {
        fn kind(&self) -> &'static str {
            match self {
                Self::Incremented(_) => "Incremented",
                Self::Reset => "Reset",
                Self::Unregistered => "Unregistered",
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Counter {
        pub total: u32,
    }

    impl Counter {
        fn incremented(&mut self, event: &CounterEvent) {
            if let CounterEvent::Incremented(by) = event {
                self.total += by;
            }
        }

        fn reset(&mut self, _event: &CounterEvent) {
            self.total = 0;
        }
    }

    static COUNTER_TYPE: LazyLock<AggregateType> =
        LazyLock::new(|| AggregateType::try_new("Counter").unwrap());

    static COUNTER_HANDLERS: LazyLock<EventHandlers<Counter>> = LazyLock::new(|| {
        EventHandlers::<Counter>::new()
            .on("Incremented", Counter::incremented)
            .and_then(|h| h.on("Reset", Counter::reset))
            .unwrap()
    });

    impl Aggregate for Counter {
        type Id = String;
        type Event = CounterEvent;

        fn aggregate_type() -> &'static AggregateType {
            &COUNTER_TYPE
        }

        fn empty(_id: &String) -> Self {
            Self::default()
        }

        fn handlers() -> &'static EventHandlers<Self> {
            &COUNTER_HANDLERS
        }
    }

    #[test]
    fn new_root_is_empty_at_initial_version() {
        let root = AggregateRoot::<Counter>::new("c1".into());
        assert_eq!(root.version(), EventVersion::initial());
        assert_eq!(root.stream_identity().as_str(), "Counter-c1");
        assert!(!root.has_uncommitted_changes());
        assert_eq!(root.state().total, 0);
    }

    #[test]
    fn recorded_changes_are_visible_immediately() {
        let mut root = AggregateRoot::<Counter>::new("c1".into());
        root.record(CounterEvent::Incremented(2)).unwrap();
        root.record(CounterEvent::Incremented(3)).unwrap();

        assert_eq!(root.state().total, 5);
        assert_eq!(root.uncommitted_changes().len(), 2);
        assert_eq!(root.version(), EventVersion::initial());
    }

    #[test]
    fn replay_advances_version_by_one_per_event() {
        let mut root = AggregateRoot::<Counter>::new("c1".into());
        root.replay(&CounterEvent::Incremented(4)).unwrap();
        root.replay(&CounterEvent::Reset).unwrap();
        root.replay(&CounterEvent::Incremented(1)).unwrap();

        assert_eq!(root.version(), EventVersion::new(3));
        assert_eq!(root.state().total, 1);
    }

    #[test]
    fn replay_is_refused_while_changes_are_pending() {
        let mut root = AggregateRoot::<Counter>::new("c1".into());
        root.record(CounterEvent::Incremented(1)).unwrap();

        let error = root.replay(&CounterEvent::Reset).unwrap_err();
        assert!(matches!(
            error,
            RepositoryError::UncommittedChanges { pending: 1, .. }
        ));
        assert_eq!(root.state().total, 1);
    }

    #[test]
    fn unhandled_kind_is_reported() {
        let mut root = AggregateRoot::<Counter>::new("c1".into());
        let error = root.record(CounterEvent::Unregistered).unwrap_err();
        assert_eq!(
            error,
            RepositoryError::UnhandledEvent {
                aggregate_type: "Counter".into(),
                kind: "Unregistered".into(),
            }
        );
        assert!(!root.has_uncommitted_changes());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let result = EventHandlers::<Counter>::new()
            .on("Reset", Counter::reset)
            .and_then(|h| h.on("Reset", Counter::reset));
        assert_eq!(
            result.unwrap_err(),
            HandlerRegistrationError::DuplicateKind("Reset")
        );
    }

    #[test]
    fn mark_committed_clears_pending_and_adopts_version() {
        let mut root = AggregateRoot::<Counter>::new("c1".into());
        root.record(CounterEvent::Incremented(1)).unwrap();
        root.mark_committed(EventVersion::new(1));

        assert!(!root.has_uncommitted_changes());
        assert_eq!(root.version(), EventVersion::new(1));
        assert!(root.ensure_clean().is_ok());
    }
}

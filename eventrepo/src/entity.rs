//! Child entities of an aggregate root.
//!
//! An entity never owns its root. It holds a [`RootRef`]: the root's id and
//! stream identity, enough to navigate back through the repository but not
//! a second handle on the root's state.

use crate::aggregate::Aggregate;
use crate::identity::StreamIdentity;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Non-owning back-reference from an entity to its aggregate root.
pub struct RootRef<A: Aggregate> {
    id: A::Id,
    stream: StreamIdentity,
    _root: PhantomData<fn() -> A>,
}

impl<A: Aggregate> RootRef<A> {
    /// References the root with the given id.
    pub fn new(id: A::Id) -> Self {
        let stream = A::stream_identity(&id);
        Self {
            id,
            stream,
            _root: PhantomData,
        }
    }

    /// The root's id.
    pub const fn id(&self) -> &A::Id {
        &self.id
    }

    /// The root's stream identity.
    pub const fn stream_identity(&self) -> &StreamIdentity {
        &self.stream
    }
}

impl<A: Aggregate> Clone for RootRef<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            stream: self.stream.clone(),
            _root: PhantomData,
        }
    }
}

impl<A: Aggregate> PartialEq for RootRef<A> {
    fn eq(&self, other: &Self) -> bool {
        self.stream == other.stream
    }
}

impl<A: Aggregate> Eq for RootRef<A> {}

impl<A: Aggregate> Hash for RootRef<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stream.hash(state);
    }
}

impl<A: Aggregate> fmt::Debug for RootRef<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RootRef").field(&self.stream.as_str()).finish()
    }
}

/// An object with identity that lives inside an aggregate.
pub trait Entity {
    /// The aggregate type owning this entity.
    type Root: Aggregate;

    /// Identifier type, unique within the root.
    type Id: Clone + Eq + fmt::Debug;

    /// Back-reference to the owning root.
    fn root(&self) -> &RootRef<Self::Root>;

    /// The entity's id.
    fn entity_id(&self) -> &Self::Id;
}

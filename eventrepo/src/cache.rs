//! Aggregate snapshot cache.
//!
//! A cache maps an aggregate id to a previously materialised
//! [`AggregateRoot`] so reads can skip replaying the whole stream. It is
//! strictly an optimisation: the repository returns the same answers with
//! [`NoCache`] as with any other implementation.

use crate::aggregate::{Aggregate, AggregateRoot};
use crate::config::MaxCacheSize;
use crate::types::EventVersion;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which cached version a lookup accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheVersion {
    /// Any cached version.
    Any,
    /// Only a snapshot at exactly this version.
    Exact(EventVersion),
}

impl CacheVersion {
    /// Whether a snapshot at `version` satisfies this lookup.
    pub fn accepts(self, version: EventVersion) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(wanted) => wanted == version,
        }
    }
}

/// Storage for materialised aggregates.
///
/// Implementations must tolerate concurrent `get`/`put` and never hand out a
/// partially written aggregate.
pub trait AggregateCache<A: Aggregate>: Send + Sync {
    /// Returns a clean copy of the cached aggregate if its version is usable.
    fn get(&self, id: &A::Id, version: CacheVersion) -> Option<AggregateRoot<A>>;

    /// Stores `aggregate`, replacing any previous entry for `id`.
    fn put(&self, id: &A::Id, aggregate: &AggregateRoot<A>);

    /// Drops the entry for `id`.
    fn evict(&self, id: &A::Id);

    /// Drops every entry.
    fn clear(&self);
}

/// The default cache: never hits, discards every put.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoCache;

impl<A: Aggregate> AggregateCache<A> for NoCache {
    fn get(&self, _id: &A::Id, _version: CacheVersion) -> Option<AggregateRoot<A>> {
        None
    }

    fn put(&self, _id: &A::Id, _aggregate: &AggregateRoot<A>) {}

    fn evict(&self, _id: &A::Id) {}

    fn clear(&self) {}
}

/// Hit and miss counters of an [`InMemoryAggregateCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned an aggregate
    pub hits: u64,
    /// Lookups that returned nothing
    pub misses: u64,
    /// Entries currently held
    pub entries: usize,
}

/// Process-local cache backed by a read-write locked map.
///
/// With a capacity bound, inserting a new id into a full cache first evicts
/// an arbitrary existing entry.
pub struct InMemoryAggregateCache<A: Aggregate> {
    entries: RwLock<HashMap<A::Id, AggregateRoot<A>>>,
    capacity: Option<usize>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<A: Aggregate> InMemoryAggregateCache<A> {
    /// Creates an unbounded cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a cache holding at most `capacity` aggregates.
    pub fn with_capacity(capacity: MaxCacheSize) -> Self {
        Self {
            capacity: Some(capacity.into_inner()),
            ..Self::new()
        }
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().len(),
        }
    }

    /// Number of cached aggregates.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<A: Aggregate> Default for InMemoryAggregateCache<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Aggregate> fmt::Debug for InMemoryAggregateCache<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryAggregateCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<A: Aggregate> AggregateCache<A> for InMemoryAggregateCache<A> {
    fn get(&self, id: &A::Id, version: CacheVersion) -> Option<AggregateRoot<A>> {
        let found = self
            .entries
            .read()
            .get(id)
            .filter(|cached| version.accepts(cached.version()))
            .cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn put(&self, id: &A::Id, aggregate: &AggregateRoot<A>) {
        // Pending changes never enter the cache.
        if aggregate.has_uncommitted_changes() {
            return;
        }
        let mut entries = self.entries.write();
        if let Some(capacity) = self.capacity {
            if entries.len() >= capacity && !entries.contains_key(id) {
                if let Some(victim) = entries.keys().next().cloned() {
                    entries.remove(&victim);
                }
            }
        }
        entries.insert(id.clone(), aggregate.clone());
    }

    fn evict(&self, id: &A::Id) {
        self.entries.write().remove(id);
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}

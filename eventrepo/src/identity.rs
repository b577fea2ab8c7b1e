//! Stream identity derivation.
//!
//! Every aggregate instance owns exactly one log stream. The stream key is
//! `"{aggregate type}-{aggregate id}"`; it is computed once when the identity
//! is built and is the only thing equality and hashing look at.

use crate::types::AggregateType;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// An opaque, immutable identifier of one aggregate within its type.
///
/// `as_string` must be stable: the same id always yields the same string,
/// since that string becomes part of the stream key.
pub trait AggregateId {
    /// Name of the id parameter, used in diagnostics (e.g. `vendorId`).
    fn id_param_name() -> &'static str {
        "id"
    }

    /// Stable string form used for stream-key construction.
    fn as_string(&self) -> String;
}

impl AggregateId for str {
    fn as_string(&self) -> String {
        self.to_owned()
    }
}

impl AggregateId for String {
    fn as_string(&self) -> String {
        self.clone()
    }
}

impl AggregateId for Uuid {
    fn as_string(&self) -> String {
        self.to_string()
    }
}

/// The unique, stable key of one aggregate's log stream.
#[derive(Debug, Clone)]
pub struct StreamIdentity {
    aggregate_type: AggregateType,
    id_param_name: String,
    aggregate_id: String,
    key: String,
}

impl StreamIdentity {
    /// Derives the stream identity of `aggregate_id` within `aggregate_type`.
    pub fn of<I>(aggregate_type: &AggregateType, id_param_name: &str, aggregate_id: &I) -> Self
    where
        I: AggregateId + ?Sized,
    {
        let aggregate_id = aggregate_id.as_string();
        let key = format!("{aggregate_type}-{aggregate_id}");
        Self {
            aggregate_type: aggregate_type.clone(),
            id_param_name: id_param_name.to_owned(),
            aggregate_id,
            key,
        }
    }

    /// Derives the identity using the id type's own parameter name.
    pub fn for_id<I>(aggregate_type: &AggregateType, aggregate_id: &I) -> Self
    where
        I: AggregateId,
    {
        Self::of(aggregate_type, I::id_param_name(), aggregate_id)
    }

    /// The derived stream key.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The aggregate type this stream belongs to.
    pub const fn aggregate_type(&self) -> &AggregateType {
        &self.aggregate_type
    }

    /// The id parameter name the identity was built with.
    pub fn id_param_name(&self) -> &str {
        &self.id_param_name
    }

    /// The string form of the aggregate id.
    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }
}

impl PartialEq for StreamIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for StreamIdentity {}

impl Hash for StreamIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl AsRef<str> for StreamIdentity {
    fn as_ref(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for StreamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn vendor() -> AggregateType {
        AggregateType::try_new("Vendor").unwrap()
    }

    #[test]
    fn key_is_type_dash_id() {
        let identity = StreamIdentity::of(&vendor(), "vendorId", "1af1e4f2");
        assert_eq!(identity.as_str(), "Vendor-1af1e4f2");
        assert_eq!(identity.to_string(), "Vendor-1af1e4f2");
        assert_eq!(identity.id_param_name(), "vendorId");
        assert_eq!(identity.aggregate_id(), "1af1e4f2");
    }

    #[test]
    fn equality_ignores_parameter_name() {
        let a = StreamIdentity::of(&vendor(), "vendorId", "7");
        let b = StreamIdentity::of(&vendor(), "id", "7");
        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn identities_naming_the_same_stream_are_equal() {
        let a = StreamIdentity::of(&AggregateType::try_new("a-b").unwrap(), "id", "c");
        let b = StreamIdentity::of(&AggregateType::try_new("a").unwrap(), "id", "b-c");
        assert_eq!(a, b);
    }

    #[test]
    fn uuid_ids_use_hyphenated_form() {
        let id = Uuid::nil();
        let identity = StreamIdentity::for_id(&vendor(), &id);
        assert_eq!(
            identity.as_str(),
            "Vendor-00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(identity.id_param_name(), "id");
    }

    proptest! {
        #[test]
        fn derivation_is_stable(id in "[a-zA-Z0-9]{1,40}") {
            let first = StreamIdentity::of(&vendor(), "id", id.as_str());
            let second = StreamIdentity::of(&vendor(), "id", &id);
            prop_assert_eq!(first.as_str(), second.as_str());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn distinct_ids_yield_distinct_streams(a in "[a-z0-9]{1,20}", b in "[a-z0-9]{1,20}") {
            prop_assume!(a != b);
            let left = StreamIdentity::of(&vendor(), "id", a.as_str());
            let right = StreamIdentity::of(&vendor(), "id", b.as_str());
            prop_assert_ne!(left, right);
        }
    }
}

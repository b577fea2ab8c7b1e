//! Repository configuration with type-safe validation.
//!
//! Every tunable is a `nutype` newtype validated at construction, so an
//! out-of-range configuration cannot be built.

use crate::serialization::SerializationFormat;
use nutype::nutype;
use serde::{Deserialize, Serialize};

/// Number of events requested per slice while replaying a stream.
///
/// Validated to be between 1 and 10 000.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10_000),
    default = 100,
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Display,
        Default,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct PageSize(usize);

/// Maximum number of append attempts in one update, the first included.
///
/// Validated to be between 1 and 50. With `1` every conflict fails
/// immediately.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 50),
    default = 3,
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Display,
        Default,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct MaxTryCount(u32);

/// Maximum number of aggregates held by a bounded cache.
///
/// Validated to be between 1 and 1 million.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 1_000_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct MaxCacheSize(usize);

/// Tunables of an [`AggregateRepository`](crate::repository::AggregateRepository).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Events per slice during replay.
    #[serde(default)]
    pub page_size: PageSize,
    /// Append attempts per update before a conflict becomes permanent.
    #[serde(default)]
    pub max_try_count: MaxTryCount,
    /// Format new events are written in.
    #[serde(default)]
    pub format: SerializationFormat,
}

impl RepositoryConfig {
    /// Configuration with the defaults: page size 100, three tries, JSON.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the replay page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the maximum number of append attempts.
    #[must_use]
    pub const fn with_max_try_count(mut self, max_try_count: MaxTryCount) -> Self {
        self.max_try_count = max_try_count;
        self
    }

    /// Set the serialization format for new events.
    #[must_use]
    pub const fn with_format(mut self, format: SerializationFormat) -> Self {
        self.format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RepositoryConfig::new();
        assert_eq!(config.page_size.into_inner(), 100);
        assert_eq!(config.max_try_count.into_inner(), 3);
        assert_eq!(config.format, SerializationFormat::Json);
    }

    #[test]
    fn test_bounds_validation() {
        assert!(PageSize::try_new(1).is_ok());
        assert!(PageSize::try_new(10_000).is_ok());
        assert!(PageSize::try_new(0).is_err());
        assert!(PageSize::try_new(10_001).is_err());

        assert!(MaxTryCount::try_new(1).is_ok());
        assert!(MaxTryCount::try_new(0).is_err());
        assert!(MaxTryCount::try_new(51).is_err());

        assert!(MaxCacheSize::try_new(0).is_err());
        assert!(MaxCacheSize::try_new(2_000_000).is_err());
    }

    #[test]
    fn builder_methods_replace_fields() {
        let config = RepositoryConfig::new()
            .with_page_size(PageSize::try_new(2).unwrap())
            .with_max_try_count(MaxTryCount::try_new(5).unwrap())
            .with_format(SerializationFormat::MessagePack);
        assert_eq!(config.page_size.into_inner(), 2);
        assert_eq!(config.max_try_count.into_inner(), 5);
        assert_eq!(config.format, SerializationFormat::MessagePack);
    }

    #[test]
    fn deserializes_partial_documents_with_defaults() {
        let config: RepositoryConfig = serde_json::from_str(r#"{"page_size": 25}"#).unwrap();
        assert_eq!(config.page_size.into_inner(), 25);
        assert_eq!(config.max_try_count, MaxTryCount::default());

        let rejected = serde_json::from_str::<RepositoryConfig>(r#"{"max_try_count": 0}"#);
        assert!(rejected.is_err());
    }
}

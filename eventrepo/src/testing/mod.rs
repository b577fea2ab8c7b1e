//! Testing utilities for repositories and event-log backends.
//!
//! Enabled with the `testing` feature.
//!
//! - [`generators`]: `proptest` strategies for the core types
//! - [`assertions`]: checks of stream and aggregate invariants
//!
//! ```rust,ignore
//! use eventrepo::testing::prelude::*;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn aggregate_types_have_no_whitespace(kind in arb_aggregate_type()) {
//!         assert!(!kind.contains(char::is_whitespace));
//!     }
//! }
//! ```

pub mod assertions;
pub mod generators;

/// Import everything needed for testing with `use eventrepo::testing::prelude::*`.
pub mod prelude {
    pub use super::assertions::*;
    pub use super::generators::*;
}

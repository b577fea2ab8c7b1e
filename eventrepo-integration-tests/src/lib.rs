//! Integration tests for `EventRepo`
//!
//! This crate holds a small vendor domain and a read-counting log wrapper
//! shared by the tests under `tests/`, which exercise the repository against
//! the in-memory event log.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod counting;
pub mod vendor;

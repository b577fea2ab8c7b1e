//! Test support for `EventRepo` event log backends.
//!
//! - [`contract`]: the behavioural contract every [`EventLog`](eventrepo::EventLog)
//!   backend must satisfy, runnable through [`event_log_contract_tests!`]
//! - [`chaos`]: a wrapper that injects failures and competing writes

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(
    rust_2018_idioms,
    unused_imports,
    unused_must_use,
    unused_mut,
    unused_qualifications
)]

pub mod chaos;
pub mod contract;

pub use chaos::{ChaosConfig, ChaosEventLog, ChaosEventLogExt, Probability};
pub use contract::{ContractTestFailure, ContractTestResult};

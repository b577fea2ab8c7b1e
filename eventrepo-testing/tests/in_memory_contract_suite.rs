//! Event log contract suite run against the in-memory backend.

use eventrepo_testing::event_log_contract_tests;

event_log_contract_tests! {
    suite = in_memory,
    make_log = eventrepo_memory::InMemoryEventLog::new,
}

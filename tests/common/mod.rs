#![allow(dead_code)]

pub use taskflow_test_utils::builders;
pub use taskflow_test_utils::{EventLog, MemorySink, RecordingTask, init_tracing, with_timeout};

/// Strings of an event log, for terse assertions.
pub fn names(events: &[&str]) -> Vec<String> {
    events.iter().map(|s| s.to_string()).collect()
}

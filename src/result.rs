// src/result.rs

//! Outcome of a single task execution.
//!
//! A [`TaskResult`] is built once per execution attempt and is not mutated
//! afterwards. Success is derived from the exit code alone.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde_json::Value;

/// Exit code of a successful execution.
pub const EXIT_OK: i32 = 0;
/// Generic failure, also used for errors caught before anything ran.
pub const EXIT_ERROR: i32 = 1;
/// The overall wall-clock timeout fired and the process was killed.
pub const EXIT_TIMEOUT: i32 = 124;
/// The idle timeout fired (no output within the window) and the process was killed.
pub const EXIT_IDLE_TIMEOUT: i32 = 125;

/// Which limit terminated a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// Overall wall-clock limit.
    Overall,
    /// Maximum gap between two chunks of output.
    Idle,
}

impl TimeoutKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeoutKind::Overall => "overall",
            TimeoutKind::Idle => "idle",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            TimeoutKind::Overall => EXIT_TIMEOUT,
            TimeoutKind::Idle => EXIT_IDLE_TIMEOUT,
        }
    }
}

/// Immutable outcome of one task execution.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    task: String,
    exit_code: i32,
    message: String,
    data: BTreeMap<String, Value>,
}

impl TaskResult {
    pub fn new(
        task: impl Into<String>,
        exit_code: i32,
        message: impl Into<String>,
        data: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            task: task.into(),
            exit_code,
            message: message.into(),
            data,
        }
    }

    pub fn success(task: impl Into<String>) -> Self {
        Self::new(task, EXIT_OK, "", BTreeMap::new())
    }

    pub fn error(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(task, EXIT_ERROR, message, BTreeMap::new())
    }

    /// Build a failing result from an error caught at the task boundary.
    ///
    /// Uses the alternate form so an `anyhow` context chain ends up in the
    /// message.
    pub fn from_error<E>(task: impl Into<String>, err: &E) -> Self
    where
        E: fmt::Display + ?Sized,
    {
        Self::error(task, format!("{err:#}"))
    }

    /// Failure for a process terminated by one of its timeouts.
    pub fn timed_out(task: impl Into<String>, kind: TimeoutKind, limit: Duration) -> Self {
        let message = match kind {
            TimeoutKind::Overall => format!(
                "process exceeded the timeout of {:.1}s and was terminated",
                limit.as_secs_f64()
            ),
            TimeoutKind::Idle => format!(
                "process produced no output for {:.1}s (idle timeout) and was terminated",
                limit.as_secs_f64()
            ),
        };
        Self::new(task, kind.exit_code(), message, BTreeMap::new())
            .with_data("timeout", kind.as_str())
    }

    /// Attach one auxiliary value while assembling a result.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == EXIT_OK
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Timeout that terminated the process, if any.
    pub fn timeout_kind(&self) -> Option<TimeoutKind> {
        match self.data.get("timeout").and_then(Value::as_str) {
            Some("overall") => Some(TimeoutKind::Overall),
            Some("idle") => Some(TimeoutKind::Idle),
            _ => None,
        }
    }

    /// Elapsed execution time, when the producer recorded one.
    pub fn elapsed(&self) -> Option<Duration> {
        self.data
            .get("time")
            .and_then(Value::as_f64)
            .map(Duration::from_secs_f64)
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            return write!(f, "{} succeeded", self.task);
        }
        match self.timeout_kind() {
            Some(kind) => write!(f, "{} timed out ({}): {}", self.task, kind.as_str(), self.message),
            None if self.message.is_empty() => {
                write!(f, "{} failed (exit code {})", self.task, self.exit_code)
            }
            None => write!(
                f,
                "{} failed (exit code {}): {}",
                self.task, self.exit_code, self.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_derived_from_exit_code() {
        assert!(TaskResult::success("a").is_success());
        assert!(!TaskResult::error("a", "boom").is_success());
        assert!(!TaskResult::new("a", 3, "", BTreeMap::new()).is_success());
    }

    #[test]
    fn from_error_keeps_cause_chain() {
        let err = anyhow::anyhow!("disk full").context("writing report");
        let result = TaskResult::from_error("report", &err);
        assert_eq!(result.exit_code(), EXIT_ERROR);
        assert_eq!(result.message(), "writing report: disk full");
    }

    #[test]
    fn timeouts_render_differently_from_plain_failures() {
        let idle = TaskResult::timed_out("sleep 5", TimeoutKind::Idle, Duration::from_secs(1));
        assert_eq!(idle.exit_code(), EXIT_IDLE_TIMEOUT);
        assert_eq!(idle.timeout_kind(), Some(TimeoutKind::Idle));
        assert!(idle.to_string().contains("timed out (idle)"));

        let plain = TaskResult::error("false", "");
        assert_eq!(plain.to_string(), "false failed (exit code 1)");
    }
}

use std::sync::{Arc, Mutex};

use taskflow::exec::{OutputSink, OutputStream};
use taskflow::result::TaskResult;
use taskflow::task::{Task, TaskContext, TaskFuture};

/// Shared, ordered record of what fake tasks did.
///
/// Entries look like `"run:A"`, `"rollback:A"` or whatever label a task was
/// given, so tests can assert on the exact interleaving.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Events with the given prefix, prefix stripped.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == event).count()
    }
}

/// A task that records `"<name>"` into an [`EventLog`] when run and returns
/// a configurable outcome.
#[derive(Debug, Clone)]
pub struct RecordingTask {
    name: String,
    log: EventLog,
    fail_with: Option<String>,
    rollback_event: Option<String>,
    defer: Vec<String>,
}

impl RecordingTask {
    /// Succeeds and records `name`.
    pub fn ok(name: &str, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            fail_with: None,
            rollback_event: None,
            defer: Vec::new(),
        }
    }

    /// Fails with `message` after recording `name`.
    pub fn failing(name: &str, message: &str, log: &EventLog) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::ok(name, log)
        }
    }

    /// Give the task its own compensating action, recorded as `event`.
    pub fn with_rollback(mut self, event: &str) -> Self {
        self.rollback_event = Some(event.to_string());
        self
    }

    /// Defer a completion recording `event` when this task runs.
    pub fn deferring(mut self, event: &str) -> Self {
        self.defer.push(event.to_string());
        self
    }
}

impl Task for RecordingTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a mut self, ctx: &'a mut TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            self.log.push(self.name.clone());
            for event in &self.defer {
                ctx.defer_completion(RecordingTask::ok(event, &self.log));
            }
            match &self.fail_with {
                Some(msg) => TaskResult::error(self.name.clone(), msg.clone()),
                None => TaskResult::success(self.name.clone()),
            }
        })
    }

    fn rollback(&mut self) -> Option<TaskFuture<'_>> {
        let event = self.rollback_event.clone()?;
        let log = self.log.clone();
        let name = self.name.clone();
        Some(Box::pin(async move {
            log.push(event);
            TaskResult::success(name)
        }))
    }
}

/// Collects streamed output lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(OutputStream, String)>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self, stream: OutputStream) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, l)| l.clone())
            .collect()
    }
}

impl OutputSink for MemorySink {
    fn line(&self, stream: OutputStream, line: &str) {
        self.lines.lock().unwrap().push((stream, line.to_string()));
    }
}

// src/tasks/code.rs

use std::fmt;

use crate::result::TaskResult;
use crate::task::{Task, TaskContext, TaskFuture};

type Code = Box<dyn FnMut() -> anyhow::Result<()> + Send>;

/// Runs in-process code as a task.
///
/// An `Err` returned by the closure becomes a failing result carrying the
/// error chain.
pub struct CodeTask {
    name: String,
    code: Code,
    rollback: Option<Code>,
}

impl CodeTask {
    pub fn new<F>(name: impl Into<String>, code: F) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            code: Box::new(code),
            rollback: None,
        }
    }

    /// Compensating code, run if a later task of the collection fails.
    pub fn with_rollback<F>(mut self, rollback: F) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        self.rollback = Some(Box::new(rollback));
        self
    }
}

fn outcome(name: &str, res: anyhow::Result<()>) -> TaskResult {
    match res {
        Ok(()) => TaskResult::success(name),
        Err(e) => TaskResult::from_error(name, &e),
    }
}

impl Task for CodeTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a mut self, _ctx: &'a mut TaskContext) -> TaskFuture<'a> {
        Box::pin(async move { outcome(&self.name, (self.code)()) })
    }

    fn rollback(&mut self) -> Option<TaskFuture<'_>> {
        let code = self.rollback.as_mut()?;
        let name = &self.name;
        Some(Box::pin(async move { outcome(name, code()) }))
    }
}

impl fmt::Debug for CodeTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeTask")
            .field("name", &self.name)
            .field("has_rollback", &self.rollback.is_some())
            .finish()
    }
}

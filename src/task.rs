// src/task.rs

//! The uniform unit of work.
//!
//! Everything that can be executed implements [`Task`]: processes, filesystem
//! operations, log rotation, in-process code and whole collections. The
//! collection runner depends on nothing but this trait.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::result::TaskResult;

/// Boxed future returned by [`Task::run`] and [`Task::rollback`].
pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = TaskResult> + Send + 'a>>;

/// A unit of work.
///
/// Implementations must never let an execution fault escape `run`: failures
/// are converted into a failing [`TaskResult`].
pub trait Task: Send {
    /// Name used in logs and carried by the results this task produces.
    fn name(&self) -> &str;

    /// Execute the task.
    ///
    /// `ctx` connects the task to the collection running it, so it can
    /// register cleanup work (see [`TaskContext::defer_completion`]).
    fn run<'a>(&'a mut self, ctx: &'a mut TaskContext) -> TaskFuture<'a>;

    /// Optional compensating action, invoked only while a collection unwinds
    /// after a failure and only if this task had succeeded.
    fn rollback(&mut self) -> Option<TaskFuture<'_>> {
        None
    }
}

impl Task for Box<dyn Task> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run<'a>(&'a mut self, ctx: &'a mut TaskContext) -> TaskFuture<'a> {
        (**self).run(ctx)
    }

    fn rollback(&mut self) -> Option<TaskFuture<'_>> {
        (**self).rollback()
    }
}

/// Registration channel between a running task and its collection.
///
/// Tasks deferred here are drained by the collection right after the task
/// returns and appended to its completion entries.
#[derive(Default)]
pub struct TaskContext {
    deferred: Vec<Box<dyn Task>>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` to run in the completion sweep of the enclosing
    /// collection.
    pub fn defer_completion(&mut self, task: impl Task + 'static) {
        self.deferred.push(Box::new(task));
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Take everything registered so far.
    pub fn take_deferred(&mut self) -> Vec<Box<dyn Task>> {
        std::mem::take(&mut self.deferred)
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.deferred.iter().map(|t| t.name()).collect();
        f.debug_struct("TaskContext")
            .field("deferred", &names)
            .finish()
    }
}

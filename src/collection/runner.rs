// src/collection/runner.rs

//! The transactional collection runner.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::collection::completion::PendingCompletion;
use crate::collection::entry::{CompletionEntry, Entry, EntryStatus, Role, TaskId};
use crate::collection::{CollectionOptions, CollectionState};
use crate::errors::{Result, TaskflowError};
use crate::result::TaskResult;
use crate::task::{Task, TaskContext, TaskFuture};

static NEXT_COLLECTION_ID: AtomicU64 = AtomicU64::new(1);

/// An ordered sequence of tasks with rollback and completion guarantees.
///
/// - Primaries run strictly in registration order.
/// - On failure, compensation runs in reverse order of the primaries that
///   succeeded. A primary's own [`Task::rollback`] and the rollbacks scoped
///   to it run at that primary's position, later registrations first.
///   Global rollbacks run at their own registration position, and only if
///   the sequence had reached them before the last failure.
/// - Completion entries run once, in registration order, after everything
///   else, whatever the outcome.
///
/// A collection is itself a [`Task`] and can be nested in another one.
pub struct Collection {
    id: u64,
    name: String,
    options: CollectionOptions,
    entries: Vec<Entry>,
    completions: Vec<CompletionEntry>,
    state: CollectionState,
}

impl Collection {
    pub fn new() -> Self {
        Self::with_options(CollectionOptions::default())
    }

    pub fn with_options(options: CollectionOptions) -> Self {
        Self {
            id: NEXT_COLLECTION_ID.fetch_add(1, Ordering::Relaxed),
            name: "collection".to_string(),
            options,
            entries: Vec::new(),
            completions: Vec::new(),
            state: CollectionState::Idle,
        }
    }

    /// Name used in logs and in the collection's own results.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    /// Number of primary tasks.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.role == Role::Primary)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a primary task.
    pub fn add(&mut self, task: impl Task + 'static) -> TaskId {
        self.warn_if_started("primary task");
        let id = TaskId {
            collection: self.id,
            index: self.entries.len(),
        };
        self.entries
            .push(Entry::new(Role::Primary, None, Box::new(task)));
        id
    }

    /// Register a completion task for the whole collection.
    pub fn add_completion(&mut self, task: impl Task + 'static) {
        self.warn_if_started("completion task");
        self.completions.push(CompletionEntry {
            scope: None,
            task: Box::new(task),
        });
    }

    /// Register a completion task on behalf of primary `id`.
    pub fn add_completion_for(&mut self, id: TaskId, task: impl Task + 'static) -> Result<()> {
        self.check_scope(id)?;
        self.warn_if_started("completion task");
        self.completions.push(CompletionEntry {
            scope: Some(id),
            task: Box::new(task),
        });
        Ok(())
    }

    /// Register a rollback task for everything added so far. It runs during
    /// failure-handling only if a primary registered after it fails.
    pub fn add_rollback(&mut self, task: impl Task + 'static) {
        self.warn_if_started("rollback task");
        self.entries
            .push(Entry::new(Role::Rollback, None, Box::new(task)));
    }

    /// Register a rollback task that runs only if primary `id` succeeded
    /// before the failure.
    pub fn add_rollback_for(&mut self, id: TaskId, task: impl Task + 'static) -> Result<()> {
        self.check_scope(id)?;
        self.warn_if_started("rollback task");
        self.entries
            .push(Entry::new(Role::Rollback, Some(id), Box::new(task)));
        Ok(())
    }

    /// Run the full protocol: primaries, failure-handling, completion sweep.
    ///
    /// Calling this on a collection that already ran is a
    /// [`TaskflowError::ProtocolMisuse`].
    pub async fn execute(&mut self) -> Result<TaskResult> {
        let pending = self.execute_without_completion().await?;
        Ok(pending.complete().await)
    }

    /// Run primaries and failure-handling, but hand the completion sweep to
    /// the returned guard.
    pub async fn execute_without_completion(&mut self) -> Result<PendingCompletion> {
        let result = self.run_primaries().await?;
        let completions = std::mem::take(&mut self.completions);
        Ok(PendingCompletion::new(self.name.clone(), result, completions))
    }

    async fn run_primaries(&mut self) -> Result<TaskResult> {
        if self.state != CollectionState::Idle {
            return Err(TaskflowError::misuse(format!(
                "collection '{}' was already run (state: {:?}); a collection runs at most once",
                self.name, self.state
            )));
        }
        self.state = CollectionState::Running;

        let started = Instant::now();
        info!(
            collection = %self.name,
            tasks = self.len(),
            stop_on_fail = self.options.stop_on_fail,
            "running collection"
        );

        let mut first_failure: Option<TaskResult> = None;
        let mut last_failed_at = 0usize;
        let mut failed = 0usize;

        for index in 0..self.entries.len() {
            if self.entries[index].role != Role::Primary {
                continue;
            }
            let id = TaskId {
                collection: self.id,
                index,
            };

            let mut ctx = TaskContext::new();
            let entry = &mut self.entries[index];
            let task_name = entry.task.name().to_string();
            debug!(collection = %self.name, task = %task_name, "running task");

            let result = entry.task.run(&mut ctx).await;
            entry.status = if result.is_success() {
                EntryStatus::Succeeded
            } else {
                EntryStatus::Failed
            };

            self.completions.extend(
                ctx.take_deferred()
                    .into_iter()
                    .map(|task| CompletionEntry {
                        scope: Some(id),
                        task,
                    }),
            );

            if result.is_success() {
                continue;
            }

            failed += 1;
            last_failed_at = index;
            error!(collection = %self.name, task = %task_name, "{result}");
            if first_failure.is_none() {
                first_failure = Some(result);
            }
            if self.options.stop_on_fail {
                warn!(collection = %self.name, "stopping collection after first failure");
                break;
            }
        }

        let elapsed = started.elapsed().as_secs_f64();

        let Some(failure) = first_failure else {
            self.state = CollectionState::CompletedOk;
            info!(collection = %self.name, elapsed_secs = elapsed, "collection succeeded");
            return Ok(TaskResult::success(self.name.clone())
                .with_data("time", elapsed)
                .with_data("tasks", self.len()));
        };

        if self.options.rollback {
            self.rollback(last_failed_at).await;
            self.state = CollectionState::CompletedWithRollback;
        } else {
            self.state = CollectionState::Aborted;
        }

        Ok(failure
            .with_data("collection", self.name.clone())
            .with_data("failed_tasks", failed))
    }

    /// Failure-handling: compensate in reverse primary order.
    ///
    /// `failed_at` is the index of the last failing primary. A failing
    /// rollback task is logged; the sweep always continues.
    async fn rollback(&mut self, failed_at: usize) {
        warn!(collection = %self.name, "rolling back");

        for index in self.rollback_order(failed_at) {
            let mut ctx = TaskContext::new();
            let entry = &mut self.entries[index];
            let task_name = entry.task.name().to_string();

            let result = match entry.role {
                Role::Primary => match entry.task.rollback() {
                    Some(fut) => fut.await,
                    None => continue,
                },
                Role::Rollback => {
                    let result = entry.task.run(&mut ctx).await;
                    entry.status = if result.is_success() {
                        EntryStatus::Succeeded
                    } else {
                        EntryStatus::Failed
                    };
                    result
                }
            };

            let scope = entry.scope;
            self.completions.extend(
                ctx.take_deferred()
                    .into_iter()
                    .map(|task| CompletionEntry { scope, task }),
            );

            if result.is_success() {
                debug!(collection = %self.name, task = %task_name, "rolled back");
            } else {
                warn!(
                    collection = %self.name,
                    task = %task_name,
                    "rollback task failed, continuing: {result}"
                );
            }
        }
    }

    /// Entry indices to compensate, in sweep order.
    ///
    /// Each active entry is keyed by the position it compensates: its own
    /// index for primaries and global rollbacks, the owning primary's index
    /// for scoped rollbacks. Keys run highest first; ties go to the later
    /// registration.
    fn rollback_order(&self, failed_at: usize) -> Vec<usize> {
        let succeeded = |index: usize| self.entries[index].status == EntryStatus::Succeeded;
        let mut order: Vec<(usize, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let key = match (entry.role, entry.scope) {
                    (Role::Primary, _) => succeeded(index).then_some(index),
                    (Role::Rollback, None) => (index < failed_at).then_some(index),
                    (Role::Rollback, Some(id)) => succeeded(id.index).then_some(id.index),
                }?;
                Some((key, index))
            })
            .collect();
        order.sort_unstable_by(|a, b| b.cmp(a));
        order.into_iter().map(|(_, index)| index).collect()
    }

    fn check_scope(&self, id: TaskId) -> Result<()> {
        let owned = id.collection == self.id
            && self
                .entries
                .get(id.index)
                .is_some_and(|e| e.role == Role::Primary);
        if owned {
            Ok(())
        } else {
            Err(TaskflowError::misuse(format!(
                "task handle {id:?} does not belong to collection '{}'",
                self.name
            )))
        }
    }

    fn warn_if_started(&self, what: &str) {
        if self.state != CollectionState::Idle {
            warn!(
                collection = %self.name,
                state = ?self.state,
                "{what} registered after the collection ran; it will never run"
            );
        }
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tasks: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.role == Role::Primary)
            .map(|e| e.task.name())
            .collect();
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("state", &self.state)
            .field("tasks", &tasks)
            .finish_non_exhaustive()
    }
}

impl Task for Collection {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a mut self, _ctx: &'a mut TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            match self.execute().await {
                Ok(result) => result,
                Err(err) => {
                    error!(collection = %self.name, error = %err, "collection cannot run");
                    TaskResult::from_error(self.name.clone(), &err)
                }
            }
        })
    }
}

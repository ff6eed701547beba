// src/collection/completion.rs

//! The completion sweep and the guard that defers it.

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, error, warn};

use crate::collection::entry::CompletionEntry;
use crate::result::TaskResult;
use crate::task::TaskContext;

/// Primary work of a collection has finished; its completion entries have
/// not run yet.
///
/// Returned by [`Collection::execute_without_completion`] so callers can
/// inspect intermediate effects (a scratch directory, a build artifact)
/// before cleanup fires. Call [`complete`](Self::complete) to run the
/// completion sweep and get the final result.
///
/// Dropping the guard without completing it still runs the sweep: it is
/// spawned on the current Tokio runtime and a warning is logged. Outside a
/// runtime the sweep cannot run and an error is logged instead.
///
/// [`Collection::execute_without_completion`]: crate::collection::Collection::execute_without_completion
#[must_use = "completion tasks only run when `complete()` is awaited"]
pub struct PendingCompletion {
    collection: String,
    result: TaskResult,
    completions: Vec<CompletionEntry>,
}

impl PendingCompletion {
    pub(crate) fn new(
        collection: String,
        result: TaskResult,
        completions: Vec<CompletionEntry>,
    ) -> Self {
        Self {
            collection,
            result,
            completions,
        }
    }

    /// Outcome of the primary sequence (and rollback, if one ran).
    pub fn result(&self) -> &TaskResult {
        &self.result
    }

    /// Number of completion tasks still waiting to run.
    pub fn pending(&self) -> usize {
        self.completions.len()
    }

    /// Run the completion sweep and return the collection's final result.
    ///
    /// Completion failures do not change success or failure; they are listed
    /// under the `completion_errors` data key.
    pub async fn complete(mut self) -> TaskResult {
        let completions = std::mem::take(&mut self.completions);
        let errors = run_completion_sweep(&self.collection, completions).await;
        let result = self.result.clone();
        if errors.is_empty() {
            result
        } else {
            result.with_data("completion_errors", errors)
        }
    }
}

impl fmt::Debug for PendingCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCompletion")
            .field("collection", &self.collection)
            .field("result", &self.result)
            .field("pending", &self.completions.len())
            .finish()
    }
}

impl Drop for PendingCompletion {
    fn drop(&mut self) {
        if self.completions.is_empty() {
            return;
        }
        let completions = std::mem::take(&mut self.completions);
        let collection = self.collection.clone();
        let pending = completions.len();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    collection = %collection,
                    pending,
                    "completion guard dropped without complete(); running completion tasks in the background"
                );
                handle.spawn(async move {
                    run_completion_sweep(&collection, completions).await;
                });
            }
            Err(_) => {
                error!(
                    collection = %collection,
                    pending,
                    "completion guard dropped outside a Tokio runtime; completion tasks did not run"
                );
            }
        }
    }
}

/// Run every completion entry once, in order. Tasks deferred by completion
/// tasks themselves are appended to the sweep.
///
/// Returns the rendered failures; a failure never stops the sweep.
pub(crate) async fn run_completion_sweep(
    collection: &str,
    completions: Vec<CompletionEntry>,
) -> Vec<String> {
    let mut queue: VecDeque<CompletionEntry> = completions.into();
    let mut errors = Vec::new();

    while let Some(mut entry) = queue.pop_front() {
        let mut ctx = TaskContext::new();
        debug!(
            collection = %collection,
            task = %entry.task.name(),
            scope = ?entry.scope.map(|id| id.index()),
            "running completion task"
        );

        let result = entry.task.run(&mut ctx).await;

        let scope = entry.scope;
        queue.extend(
            ctx.take_deferred()
                .into_iter()
                .map(|task| CompletionEntry { scope, task }),
        );

        if !result.is_success() {
            warn!(collection = %collection, "completion task failed: {result}");
            errors.push(result.to_string());
        }
    }

    errors
}

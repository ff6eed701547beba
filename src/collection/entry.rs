// src/collection/entry.rs

//! Registered entries of a collection and their per-run state.

use crate::task::Task;

/// Handle to a primary task, returned by [`Collection::add`].
///
/// Used to scope rollback and completion registrations to that task. A
/// handle is only valid for the collection that issued it.
///
/// [`Collection::add`]: crate::collection::Collection::add
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId {
    pub(crate) collection: u64,
    pub(crate) index: usize,
}

impl TaskId {
    pub(crate) fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Primary,
    Rollback,
}

/// Per-run state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryStatus {
    /// Not run (yet, or never because the sequence stopped earlier).
    Pending,
    Succeeded,
    Failed,
}

/// A primary or rollback entry, kept in registration order.
pub(crate) struct Entry {
    pub role: Role,
    /// Primary this entry belongs to; `None` for primaries and global
    /// rollbacks.
    pub scope: Option<TaskId>,
    pub task: Box<dyn Task>,
    pub status: EntryStatus,
}

impl Entry {
    pub fn new(role: Role, scope: Option<TaskId>, task: Box<dyn Task>) -> Self {
        Self {
            role,
            scope,
            task,
            status: EntryStatus::Pending,
        }
    }
}

/// A completion entry. Completions keep their own registration order.
pub(crate) struct CompletionEntry {
    pub scope: Option<TaskId>,
    pub task: Box<dyn Task>,
}

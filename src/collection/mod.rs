// src/collection/mod.rs

//! Ordered task sequences with rollback and completion guarantees.
//!
//! - [`runner`] holds [`Collection`], the state machine that runs primaries,
//!   unwinds on failure and hands over to the completion sweep.
//! - [`completion`] holds the sweep and [`PendingCompletion`], the guard
//!   returned when a caller wants to look at interim effects before cleanup.
//! - [`entry`] defines registered entries and the [`TaskId`] handle.

pub mod completion;
pub mod entry;
pub mod runner;

pub use completion::PendingCompletion;
pub use entry::TaskId;
pub use runner::Collection;

/// Construction parameters of a [`Collection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionOptions {
    /// Stop running primaries after the first failure (default `true`).
    ///
    /// When `false` every primary runs; the collection still fails if any
    /// of them failed, carrying the first failure.
    pub stop_on_fail: bool,

    /// Run failure-handling (rollback entries) when a primary failed
    /// (default `true`).
    pub rollback: bool,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            stop_on_fail: true,
            rollback: true,
        }
    }
}

/// Lifecycle of one collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Idle,
    Running,
    /// Every primary succeeded.
    CompletedOk,
    /// A primary failed and failure-handling ran.
    CompletedWithRollback,
    /// A primary failed and rollback was disabled.
    Aborted,
}

impl CollectionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CollectionState::CompletedOk
                | CollectionState::CompletedWithRollback
                | CollectionState::Aborted
        )
    }
}

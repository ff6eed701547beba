// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running shell commands, using
//! `tokio::process::Command`, and turning what happened into a
//! [`TaskResult`](crate::result::TaskResult).
//!
//! - [`command`] holds [`ExecTask`], its builder and strategy selection.
//! - [`task_runner`] supervises synchronous runs (capture, streaming,
//!   interactive, overall and idle timeouts).
//! - [`background`] starts fire-and-forget processes.
//! - [`output`] provides the [`OutputSink`] used for streamed output.

mod background;
pub mod command;
pub mod output;
mod stdin;
mod task_runner;

pub use command::{ExecInput, ExecMode, ExecTask};
pub use output::{ConsoleSink, OutputSink, OutputStream};

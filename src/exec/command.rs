// src/exec/command.rs

//! `ExecTask`: a task that runs one shell command.
//!
//! The builder collects the execution configuration; [`Task::run`] picks a
//! strategy in priority order:
//!
//! 1. background (spawn and return immediately),
//! 2. synchronous with captured output,
//! 3. synchronous with output streamed to the [`OutputSink`].
//!
//! Interactive mode modifies (2)/(3) by handing the child our terminal.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::errors::{Result, TaskflowError};
use crate::exec::background;
use crate::exec::output::{ConsoleSink, OutputSink};
use crate::exec::task_runner::{self, Limits, RunSpec};
use crate::result::TaskResult;
use crate::task::{Task, TaskContext, TaskFuture};

/// Payload written to the child's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecInput {
    /// Literal text.
    Text(String),
    /// Contents of a file, streamed as the child reads.
    File(PathBuf),
}

impl From<&str> for ExecInput {
    fn from(s: &str) -> Self {
        ExecInput::Text(s.to_string())
    }
}

impl From<String> for ExecInput {
    fn from(s: String) -> Self {
        ExecInput::Text(s)
    }
}

/// Execution strategy chosen for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Background,
    Captured,
    Streamed,
}

/// Runs a shell command.
///
/// No quoting or escaping is applied: the command string reaches `sh -c`
/// (`cmd /C` on Windows) verbatim.
pub struct ExecTask {
    command: String,
    dir: Option<PathBuf>,
    env: Option<BTreeMap<String, String>>,
    input: Option<ExecInput>,
    background: bool,
    interactive: bool,
    print_output: bool,
    print_metadata: bool,
    timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    sink: Arc<dyn OutputSink>,
    /// Child started in background mode that may still be running.
    child: Option<Child>,
}

impl ExecTask {
    /// Create a task for `command`. An empty command is a configuration error.
    pub fn new(command: impl Into<String>) -> Result<Self> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(TaskflowError::config("exec command must not be empty"));
        }
        Ok(Self {
            command,
            dir: None,
            env: None,
            input: None,
            background: false,
            interactive: false,
            print_output: true,
            print_metadata: true,
            timeout: None,
            idle_timeout: None,
            sink: Arc::new(ConsoleSink),
            child: None,
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Working directory of the child. It is not checked here; a missing
    /// directory surfaces as a start failure.
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Replace the inherited environment with exactly these variables.
    pub fn env<K, V, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env = self.env.get_or_insert_with(BTreeMap::new);
        env.extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a single variable to the replacement environment.
    pub fn env_var(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env([(key.into(), value.into())])
    }

    pub fn input(mut self, input: impl Into<ExecInput>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    /// Attach the invoking terminal to the child.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Stream output live (`true`, the default) or only capture it.
    pub fn print_output(mut self, print: bool) -> Self {
        self.print_output = print;
        self
    }

    /// Log the command (and directory) before running it.
    pub fn print_metadata(mut self, print: bool) -> Self {
        self.print_metadata = print;
        self
    }

    /// Shortcut for turning off both output and metadata printing.
    pub fn silent(mut self, silent: bool) -> Self {
        self.print_output = !silent;
        self.print_metadata = !silent;
        self
    }

    /// Kill the process if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(TaskflowError::config(format!(
                "timeout for '{}' must be positive",
                self.command
            )));
        }
        self.timeout = Some(timeout);
        Ok(self)
    }

    /// Kill the process if it produces no output for `timeout`.
    pub fn idle_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(TaskflowError::config(format!(
                "idle timeout for '{}' must be positive",
                self.command
            )));
        }
        self.idle_timeout = Some(timeout);
        Ok(self)
    }

    pub fn output_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn mode(&self) -> ExecMode {
        if self.background {
            ExecMode::Background
        } else if self.print_output {
            ExecMode::Streamed
        } else {
            ExecMode::Captured
        }
    }

    /// Whether a background child started by this task is still alive.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.as_mut().map(|c| c.try_wait()), Some(Ok(None)))
    }

    /// Process id of the background child, if one was started.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Stop a still-running background child. Best effort.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                if let Err(e) = child.start_kill() {
                    warn!(command = %self.command, error = %e, "failed to stop background process");
                    return;
                }
                info!(command = %self.command, "Stopped {}", self.command);
            }
        }
    }

    fn print_action(&self) {
        match &self.dir {
            Some(dir) => info!(
                command = %self.command,
                dir = %dir.display(),
                "Running {} in {}",
                self.command,
                dir.display()
            ),
            None => info!(command = %self.command, "Running {}", self.command),
        }
    }

    /// Build the platform shell invocation with directory and environment
    /// applied. Stdio is left to the strategy.
    pub(crate) fn build_command(&self) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.command);
            c
        };

        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        if let Some(env) = &self.env {
            cmd.env_clear().envs(env);
        }
        cmd.stdin(if self.input.is_some() {
            Stdio::piped()
        } else if self.interactive {
            Stdio::inherit()
        } else {
            Stdio::null()
        });
        cmd
    }

    pub(crate) fn input_payload(&self) -> Option<&ExecInput> {
        self.input.as_ref()
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    async fn execute(&mut self) -> TaskResult {
        if self.print_metadata {
            self.print_action();
        }

        if self.background && self.interactive {
            warn!(
                command = %self.command,
                "background and interactive are exclusive; running in background"
            );
        }

        match self.mode() {
            ExecMode::Background => {
                // A previous background child of this task must not be orphaned.
                self.stop();
                match background::start(self) {
                    Ok(child) => {
                        let result = TaskResult::success(self.command.clone())
                            .with_data("background", true);
                        let result = match child.id() {
                            Some(pid) => result.with_data("pid", pid),
                            None => result,
                        };
                        self.child = Some(child);
                        result
                    }
                    Err(e) => TaskResult::from_error(self.command.clone(), &e),
                }
            }
            mode => {
                let spec = RunSpec {
                    name: self.command.clone(),
                    interactive: self.interactive,
                    input: self.input.clone(),
                    limits: Limits {
                        timeout: self.timeout,
                        idle_timeout: self.idle_timeout,
                    },
                };
                let sink = (mode == ExecMode::Streamed).then(|| Arc::clone(&self.sink));
                task_runner::run_to_completion(self.build_command(), spec, sink).await
            }
        }
    }

    pub(crate) fn prints_output(&self) -> bool {
        self.print_output
    }
}

impl fmt::Debug for ExecTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecTask")
            .field("command", &self.command)
            .field("dir", &self.dir)
            .field("env", &self.env)
            .field("mode", &self.mode())
            .field("interactive", &self.interactive)
            .field("timeout", &self.timeout)
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

impl Task for ExecTask {
    fn name(&self) -> &str {
        &self.command
    }

    fn run<'a>(&'a mut self, _ctx: &'a mut TaskContext) -> TaskFuture<'a> {
        Box::pin(self.execute())
    }
}

impl Drop for ExecTask {
    fn drop(&mut self) {
        self.stop();
    }
}

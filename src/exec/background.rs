// src/exec/background.rs

//! Fire-and-forget process start.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Child;
use tracing::debug;

use crate::exec::command::ExecTask;
use crate::exec::stdin::feed_stdin;

/// Spawn `task`'s command without waiting for it.
///
/// Output goes to our console when the task prints output and to the null
/// device otherwise, so an unread pipe can never block the child. The
/// returned child is owned by the task, which stops it on drop.
pub(crate) fn start(task: &ExecTask) -> Result<Child> {
    let mut cmd = task.build_command();
    let (stdout, stderr) = if task.prints_output() {
        (Stdio::inherit(), Stdio::inherit())
    } else {
        (Stdio::null(), Stdio::null())
    };
    cmd.stdout(stdout).stderr(stderr);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("starting background process '{}'", task.command()))?;

    if let Some(input) = task.input_payload() {
        feed_stdin(task.command(), &mut child, input.clone());
    }

    debug!(command = %task.command(), pid = ?child.id(), "background process started");
    Ok(child)
}

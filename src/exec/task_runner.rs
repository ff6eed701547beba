// src/exec/task_runner.rs

//! Synchronous (from the caller's point of view) process runs.
//!
//! The child is supervised in a single `select!` loop that reads raw chunks
//! from stdout and stderr, waits for exit, and watches two independent
//! deadlines:
//!
//! - the overall timeout, fixed when the child starts;
//! - the idle timeout, pushed forward every time any bytes arrive, whether
//!   or not they end a line.
//!
//! Chunks are split into lines for the sink and the captured output. Bytes
//! that are not valid UTF-8 are replaced, so odd output never fails a run.
//!
//! Whichever deadline fires first kills the child and decides the failure.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::exec::command::ExecInput;
use crate::exec::output::{OutputSink, OutputStream};
use crate::exec::stdin::feed_stdin;
use crate::result::{TaskResult, TimeoutKind};

/// Optional limits for one run. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Limits {
    pub timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

/// Everything a synchronous run needs, detached from the `ExecTask`.
#[derive(Debug)]
pub(crate) struct RunSpec {
    pub name: String,
    pub interactive: bool,
    pub input: Option<ExecInput>,
    pub limits: Limits,
}

/// How supervision ended.
#[derive(Debug)]
enum Finish {
    Exited(ExitStatus),
    TimedOut(TimeoutKind, Duration),
}

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Default)]
struct Captured {
    stdout: Vec<String>,
    stderr: Vec<String>,
}

impl Captured {
    fn emit(&mut self, stream: OutputStream, line: String, sink: Option<&dyn OutputSink>) {
        if let Some(sink) = sink {
            sink.line(stream, &line);
        }
        match stream {
            OutputStream::Stdout => self.stdout.push(line),
            OutputStream::Stderr => self.stderr.push(line),
        }
    }
}

/// Accumulates raw output and hands back complete lines.
#[derive(Debug, Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Trailing output that never got its newline.
    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode_line(&self.pending);
        self.pending.clear();
        Some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r".as_slice()).unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// One output pipe of the child. Closed once EOF was seen.
struct OutputPipe<R> {
    stream: OutputStream,
    reader: Option<R>,
    lines: LineSplitter,
    buf: Vec<u8>,
}

impl<R> OutputPipe<R>
where
    R: AsyncRead + Unpin,
{
    fn new(stream: OutputStream, reader: Option<R>) -> Self {
        Self {
            stream,
            reader,
            lines: LineSplitter::default(),
            buf: vec![0; READ_CHUNK],
        }
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Next chunk of raw bytes; pends forever once the pipe is closed.
    async fn read_chunk(&mut self) -> std::io::Result<usize> {
        match self.reader.as_mut() {
            Some(reader) => reader.read(&mut self.buf).await,
            None => std::future::pending().await,
        }
    }

    /// Split the `n` bytes just read into lines. `0` means EOF.
    fn consume(&mut self, n: usize, sink: Option<&dyn OutputSink>, captured: &mut Captured) {
        if n == 0 {
            self.reader = None;
            if let Some(line) = self.lines.finish() {
                captured.emit(self.stream, line, sink);
            }
            return;
        }
        for line in self.lines.push(&self.buf[..n]) {
            captured.emit(self.stream, line, sink);
        }
    }
}

/// Run `cmd` to completion (or until a timeout kills it) and build the
/// result. Start failures become failing results.
pub(crate) async fn run_to_completion(
    cmd: Command,
    spec: RunSpec,
    sink: Option<Arc<dyn OutputSink>>,
) -> TaskResult {
    let started = Instant::now();
    let mut captured = Captured::default();

    let finish = supervise(cmd, &spec, sink.as_deref(), &mut captured).await;
    let elapsed = started.elapsed().as_secs_f64();

    match finish {
        Ok(Finish::Exited(status)) => {
            let code = status.code().unwrap_or(-1);
            info!(
                command = %spec.name,
                exit_code = code,
                success = status.success(),
                elapsed_secs = elapsed,
                "process exited"
            );
            let mut result = TaskResult::new(
                spec.name,
                code,
                captured.stdout.join("\n"),
                Default::default(),
            )
            .with_data("time", elapsed);
            if !captured.stderr.is_empty() {
                result = result.with_data("stderr", captured.stderr.join("\n"));
            }
            result
        }
        Ok(Finish::TimedOut(kind, limit)) => {
            warn!(
                command = %spec.name,
                timeout = kind.as_str(),
                limit_secs = limit.as_secs_f64(),
                "process killed after timeout"
            );
            TaskResult::timed_out(spec.name, kind, limit)
                .with_data("time", elapsed)
                .with_data("output", captured.stdout.join("\n"))
        }
        Err(err) => {
            warn!(command = %spec.name, error = %format!("{err:#}"), "process could not be run");
            TaskResult::from_error(spec.name, &err).with_data("time", elapsed)
        }
    }
}

async fn supervise(
    mut cmd: Command,
    spec: &RunSpec,
    sink: Option<&dyn OutputSink>,
    captured: &mut Captured,
) -> Result<Finish> {
    let mut limits = spec.limits;

    if spec.interactive {
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        if limits.idle_timeout.take().is_some() {
            warn!(
                command = %spec.name,
                "idle timeout cannot be observed for an interactive process; ignoring it"
            );
        }
    } else {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    }
    cmd.kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process '{}'", spec.name))?;

    if let Some(input) = spec.input.clone() {
        feed_stdin(&spec.name, &mut child, input);
    }

    let started = Instant::now();
    let overall_deadline = limits.timeout.map(|t| started + t);
    let mut last_output = started;

    let mut stdout = OutputPipe::new(OutputStream::Stdout, child.stdout.take());
    let mut stderr = OutputPipe::new(OutputStream::Stderr, child.stderr.take());
    let mut status: Option<ExitStatus> = None;

    loop {
        if let Some(status) = status {
            if !stdout.is_open() && !stderr.is_open() {
                return Ok(Finish::Exited(status));
            }
        }

        let idle_deadline = limits.idle_timeout.map(|t| last_output + t);

        tokio::select! {
            read = stdout.read_chunk(), if stdout.is_open() => {
                let n = read.context("reading stdout")?;
                if n > 0 {
                    last_output = Instant::now();
                }
                stdout.consume(n, sink, captured);
            }
            read = stderr.read_chunk(), if stderr.is_open() => {
                let n = read.context("reading stderr")?;
                if n > 0 {
                    last_output = Instant::now();
                }
                stderr.consume(n, sink, captured);
            }
            res = child.wait(), if status.is_none() => {
                status = Some(res.with_context(|| format!("waiting for process '{}'", spec.name))?);
            }
            _ = sleep_until_opt(overall_deadline) => {
                kill(&mut child, &spec.name).await;
                let limit = limits.timeout.unwrap_or_default();
                return Ok(Finish::TimedOut(TimeoutKind::Overall, limit));
            }
            _ = sleep_until_opt(idle_deadline) => {
                kill(&mut child, &spec.name).await;
                let limit = limits.idle_timeout.unwrap_or_default();
                return Ok(Finish::TimedOut(TimeoutKind::Idle, limit));
            }
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn kill(child: &mut Child, name: &str) {
    if let Err(e) = child.kill().await {
        warn!(command = %name, error = %e, "failed to kill timed out process");
    } else {
        debug!(command = %name, "timed out process killed");
    }
}

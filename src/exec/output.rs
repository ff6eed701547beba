// src/exec/output.rs

//! Line-oriented sinks for streamed process output.

use std::fmt::Debug;
use std::io::Write;

/// Which pipe a line of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives process output line by line while a command runs.
///
/// Called from inside a blocking synchronous run, so implementations should
/// return quickly.
pub trait OutputSink: Send + Sync + Debug {
    fn line(&self, stream: OutputStream, line: &str);
}

/// Forwards stdout lines to our stdout and stderr lines to our stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn line(&self, stream: OutputStream, line: &str) {
        // Write errors (closed pipe etc.) are not worth failing the task for.
        let _ = match stream {
            OutputStream::Stdout => writeln!(std::io::stdout().lock(), "{line}"),
            OutputStream::Stderr => writeln!(std::io::stderr().lock(), "{line}"),
        };
    }
}

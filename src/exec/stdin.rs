// src/exec/stdin.rs

use tokio::io::AsyncWriteExt;
use tokio::process::Child;
use tracing::{debug, warn};

use crate::exec::command::ExecInput;

/// Write `input` to the child's stdin on a separate Tokio task, then close
/// the pipe so the child sees EOF.
///
/// A child that exits without reading everything produces a broken pipe,
/// which is only logged.
pub(crate) fn feed_stdin(command: &str, child: &mut Child, input: ExecInput) {
    let Some(mut stdin) = child.stdin.take() else {
        warn!(command = %command, "input configured but stdin is not piped");
        return;
    };
    let command = command.to_string();

    tokio::spawn(async move {
        let res = match input {
            ExecInput::Text(text) => stdin.write_all(text.as_bytes()).await,
            ExecInput::File(path) => match tokio::fs::File::open(&path).await {
                Ok(mut file) => tokio::io::copy(&mut file, &mut stdin).await.map(|_| ()),
                Err(e) => {
                    warn!(command = %command, path = %path.display(), error = %e, "cannot open input file");
                    return;
                }
            },
        };
        if let Err(e) = res {
            debug!(command = %command, error = %e, "writing stdin failed");
        }
        // Dropping `stdin` here closes the pipe.
    });
}

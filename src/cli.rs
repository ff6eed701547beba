// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskflow",
    version,
    about = "Run task pipelines with rollback on failure and guaranteed cleanup.",
    long_about = None
)]
pub struct CliArgs {
    /// Pipeline to run. Defaults to `[settings].default`, or the only
    /// pipeline in the file.
    #[arg(value_name = "PIPELINE")]
    pub pipeline: Option<String>,

    /// Path to the pipeline file (TOML).
    #[arg(long, short = 'f', value_name = "PATH", default_value = "Taskflow.toml")]
    pub file: String,

    /// Keep running steps after a failure; the run still fails and rolls back.
    #[arg(long)]
    pub keep_going: bool,

    /// List the pipelines in the file and exit.
    #[arg(long)]
    pub list: bool,

    /// Parse + validate, print the pipeline, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

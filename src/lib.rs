// src/lib.rs

pub mod cli;
pub mod collection;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod result;
pub mod task;
pub mod tasks;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::model::{ConfigFile, StepConfig};
use crate::config::{BuildOptions, build_pipeline, load_and_validate};
use crate::result::{EXIT_ERROR, EXIT_OK, TaskResult};

pub use crate::collection::{Collection, CollectionOptions, CollectionState, PendingCompletion, TaskId};
pub use crate::errors::TaskflowError;
pub use crate::exec::{ExecInput, ExecMode, ExecTask};
pub use crate::result::TimeoutKind;
pub use crate::task::{Task, TaskContext, TaskFuture};
pub use crate::tasks::{CodeTask, FilesystemStack, RotateLog, TmpDir};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the pipeline file, builds the selected pipeline and
/// runs it. Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.file);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if args.list {
        print_pipelines(&cfg);
        return Ok(EXIT_OK);
    }

    let name = match args.pipeline.as_deref().or_else(|| cfg.default_pipeline()) {
        Some(name) => name.to_string(),
        None => {
            return Err(anyhow!(
                "no pipeline given and no [settings].default; available: {}",
                cfg.pipeline.keys().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
    };

    if args.dry_run {
        print_dry_run(&cfg, &name)?;
        return Ok(EXIT_OK);
    }

    let opts = BuildOptions {
        keep_going: args.keep_going,
    };
    let mut collection = build_pipeline(&cfg, &name, opts)?;
    info!(pipeline = %name, "starting pipeline");

    let result = collection.execute().await?;
    report(&result);
    Ok(process_exit_code(&result))
}

fn report(result: &TaskResult) {
    if result.is_success() {
        info!("{result}");
    } else {
        error!("{result}");
    }
    if let Some(errors) = result.get("completion_errors") {
        error!("completion tasks failed: {errors}");
    }
}

/// Exit codes are truncated to 8 bits by the OS; a failure must never
/// truncate to 0.
pub fn process_exit_code(result: &TaskResult) -> i32 {
    let code = result.exit_code();
    if result.is_success() {
        EXIT_OK
    } else if code & 0xff == 0 {
        EXIT_ERROR
    } else {
        code
    }
}

fn print_pipelines(cfg: &ConfigFile) {
    let default = cfg.default_pipeline();
    for (name, pipeline) in cfg.pipeline.iter() {
        let marker = if Some(name.as_str()) == default { " (default)" } else { "" };
        println!("{name}{marker}: {} step(s)", pipeline.steps.len());
    }
}

/// Print the steps of `name` without running anything.
fn print_dry_run(cfg: &ConfigFile, name: &str) -> Result<()> {
    let pipeline = cfg
        .pipeline
        .get(name)
        .ok_or_else(|| TaskflowError::PipelineNotFound(name.to_string()))?;

    println!("taskflow dry-run: pipeline '{name}'");
    println!(
        "  stop_on_fail = {}",
        pipeline.stop_on_fail.unwrap_or(cfg.settings.stop_on_fail)
    );
    println!("  rollback = {}", cfg.settings.rollback);
    println!();

    println!("steps ({}):", pipeline.steps.len());
    for step in &pipeline.steps {
        println!("  - {}", describe_step(step));
        for rb in &step.rollback {
            println!("      rollback: {}", describe_step(rb));
        }
        for done in &step.completion {
            println!("      completion: {}", describe_step(done));
        }
    }
    if !pipeline.rollback.is_empty() {
        println!("rollback:");
        for rb in &pipeline.rollback {
            println!("  - {}", describe_step(rb));
        }
    }
    if !pipeline.completion.is_empty() {
        println!("completion:");
        for done in &pipeline.completion {
            println!("  - {}", describe_step(done));
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn describe_step(step: &StepConfig) -> String {
    let Some(action) = step.action() else {
        return "<invalid step>".to_string();
    };
    let mut line = format!("{}: {}", action.kind(), action.argument());
    if let Some(dir) = &step.dir {
        line.push_str(&format!(" (in {dir})"));
    }
    if let Some(t) = step.timeout {
        line.push_str(&format!(" timeout={t}s"));
    }
    if let Some(t) = step.idle_timeout {
        line.push_str(&format!(" idle_timeout={t}s"));
    }
    if let Some(keep) = step.keep {
        line.push_str(&format!(" keep={keep}"));
    }
    if step.background {
        line.push_str(" [background]");
    }
    if step.interactive {
        line.push_str(" [interactive]");
    }
    line
}

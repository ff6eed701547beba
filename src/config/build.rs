// src/config/build.rs

//! Turn a validated [`ConfigFile`] into runnable collections.

use std::time::Duration;

use tracing::debug;

use crate::collection::{Collection, CollectionOptions};
use crate::config::model::{ConfigFile, StepAction, StepConfig};
use crate::errors::{Result, TaskflowError};
use crate::exec::ExecTask;
use crate::task::Task;
use crate::tasks::{FilesystemStack, RotateLog, TmpDir};

/// Knobs applied on top of the file's settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Run every step even after a failure (`--keep-going`).
    pub keep_going: bool,
}

/// Build the collection for pipeline `name`.
///
/// Nested `pipeline` steps become nested collections.
pub fn build_pipeline(cfg: &ConfigFile, name: &str, opts: BuildOptions) -> Result<Collection> {
    let pipeline = cfg
        .pipeline
        .get(name)
        .ok_or_else(|| TaskflowError::PipelineNotFound(name.to_string()))?;

    let stop_on_fail = !opts.keep_going
        && pipeline
            .stop_on_fail
            .unwrap_or(cfg.settings.stop_on_fail);
    let options = CollectionOptions {
        stop_on_fail,
        rollback: cfg.settings.rollback,
    };
    let mut collection = Collection::with_options(options).named(name);

    // Registered ahead of the steps so any failing step reaches them; they
    // run after every per-step compensation.
    for rb in &pipeline.rollback {
        collection.add_rollback(build_step(cfg, rb, opts)?);
    }
    for step in &pipeline.steps {
        let id = collection.add(build_step(cfg, step, opts)?);
        for rb in &step.rollback {
            collection.add_rollback_for(id, build_step(cfg, rb, opts)?)?;
        }
        for done in &step.completion {
            collection.add_completion_for(id, build_step(cfg, done, opts)?)?;
        }
    }
    for done in &pipeline.completion {
        collection.add_completion(build_step(cfg, done, opts)?);
    }

    debug!(pipeline = %name, ?options, tasks = collection.len(), "pipeline built");
    Ok(collection)
}

fn build_step(cfg: &ConfigFile, step: &StepConfig, opts: BuildOptions) -> Result<Box<dyn Task>> {
    let action = step
        .action()
        .ok_or_else(|| TaskflowError::config("step must have exactly one action"))?;

    let task: Box<dyn Task> = match action {
        StepAction::Exec(cmd) => Box::new(build_exec(cmd, step)?),
        StepAction::Pipeline(target) => Box::new(build_pipeline(cfg, target, opts)?),
        StepAction::Mkdir(p) => Box::new(FilesystemStack::new().named(format!("mkdir {p}")).mkdir(p)),
        StepAction::Touch(p) => Box::new(FilesystemStack::new().named(format!("touch {p}")).touch(p)),
        StepAction::Remove(p) => {
            Box::new(FilesystemStack::new().named(format!("remove {p}")).remove(p))
        }
        StepAction::DeleteDir(p) => Box::new(
            FilesystemStack::new()
                .named(format!("delete dir {p}"))
                .delete_dir(p),
        ),
        StepAction::CleanDir(p) => Box::new(
            FilesystemStack::new()
                .named(format!("clean dir {p}"))
                .clean_dir(p),
        ),
        StepAction::RotateLog(p) => {
            let rotate = RotateLog::new(p);
            Box::new(match step.keep {
                Some(keep) => rotate.keep(keep)?,
                None => rotate,
            })
        }
        StepAction::TmpDir(prefix) => Box::new(TmpDir::reserve(prefix)),
    };
    Ok(task)
}

fn build_exec(cmd: &str, step: &StepConfig) -> Result<ExecTask> {
    let mut task = ExecTask::new(cmd)?
        .background(step.background)
        .interactive(step.interactive)
        .silent(step.silent);

    if let Some(dir) = &step.dir {
        task = task.dir(dir);
    }
    if let Some(env) = &step.env {
        task = task.env(env.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let Some(input) = &step.input {
        task = task.input(input.as_str());
    }
    if let Some(secs) = step.timeout {
        task = task.timeout(seconds(secs)?)?;
    }
    if let Some(secs) = step.idle_timeout {
        task = task.idle_timeout(seconds(secs)?)?;
    }
    Ok(task)
}

fn seconds(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| TaskflowError::config(format!("invalid duration {secs}: {e}")))
}

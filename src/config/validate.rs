// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, PipelineConfig, RawConfigFile, StepAction, StepConfig};
use crate::errors::{Result, TaskflowError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TaskflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.settings, raw.pipeline))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_pipelines(cfg)?;
    validate_default(cfg)?;
    for (name, pipeline) in cfg.pipeline.iter() {
        validate_pipeline(cfg, name, pipeline)?;
    }
    validate_pipeline_graph(cfg)?;
    Ok(())
}

fn ensure_has_pipelines(cfg: &RawConfigFile) -> Result<()> {
    if cfg.pipeline.is_empty() {
        return Err(TaskflowError::config(
            "pipeline file must contain at least one [pipeline.<name>] section",
        ));
    }
    Ok(())
}

fn validate_default(cfg: &RawConfigFile) -> Result<()> {
    match cfg.settings.default.as_deref() {
        Some(default) if !cfg.pipeline.contains_key(default) => Err(TaskflowError::config(
            format!("[settings].default names unknown pipeline '{default}'"),
        )),
        _ => Ok(()),
    }
}

fn validate_pipeline(cfg: &RawConfigFile, name: &str, pipeline: &PipelineConfig) -> Result<()> {
    for (i, step) in pipeline.steps.iter().enumerate() {
        let at = format!("pipeline '{name}' step {}", i + 1);
        validate_step(cfg, &at, step)?;
        for (j, nested) in step.rollback.iter().enumerate() {
            validate_nested(cfg, &format!("{at} rollback {}", j + 1), nested)?;
        }
        for (j, nested) in step.completion.iter().enumerate() {
            validate_nested(cfg, &format!("{at} completion {}", j + 1), nested)?;
        }
    }
    for (i, step) in pipeline.rollback.iter().enumerate() {
        validate_nested(cfg, &format!("pipeline '{name}' rollback {}", i + 1), step)?;
    }
    for (i, step) in pipeline.completion.iter().enumerate() {
        validate_nested(cfg, &format!("pipeline '{name}' completion {}", i + 1), step)?;
    }
    Ok(())
}

fn validate_nested(cfg: &RawConfigFile, at: &str, step: &StepConfig) -> Result<()> {
    if !step.rollback.is_empty() || !step.completion.is_empty() {
        return Err(TaskflowError::config(format!(
            "{at}: rollback and completion steps cannot carry rollback or completion steps of their own"
        )));
    }
    validate_step(cfg, at, step)
}

fn validate_step(cfg: &RawConfigFile, at: &str, step: &StepConfig) -> Result<()> {
    let actions = step.actions();
    let action = match actions.as_slice() {
        [one] => *one,
        [] => {
            return Err(TaskflowError::config(format!(
                "{at}: no action (expected one of exec, pipeline, mkdir, touch, remove, delete_dir, clean_dir, rotate_log, tmp_dir)"
            )));
        }
        many => {
            let kinds: Vec<_> = many.iter().map(|a| a.kind()).collect();
            return Err(TaskflowError::config(format!(
                "{at}: exactly one action allowed, found {}",
                kinds.join(", ")
            )));
        }
    };

    if action.argument().trim().is_empty() {
        return Err(TaskflowError::config(format!(
            "{at}: `{}` must not be empty",
            action.kind()
        )));
    }

    if !matches!(action, StepAction::Exec(_)) && step.has_exec_modifiers() {
        return Err(TaskflowError::config(format!(
            "{at}: dir, env, input, timeout, idle_timeout, background, interactive and silent only apply to exec steps"
        )));
    }

    match action {
        StepAction::RotateLog(_) => {
            if step.keep == Some(0) {
                return Err(TaskflowError::config(format!(
                    "{at}: keep must be at least 1"
                )));
            }
        }
        _ if step.keep.is_some() => {
            return Err(TaskflowError::config(format!(
                "{at}: keep only applies to rotate_log steps"
            )));
        }
        _ => {}
    }

    for (field, value) in [("timeout", step.timeout), ("idle_timeout", step.idle_timeout)] {
        let Some(secs) = value else { continue };
        if !(secs.is_finite() && secs > 0.0) {
            return Err(TaskflowError::config(format!(
                "{at}: {field} must be a positive number of seconds (got {secs})"
            )));
        }
    }

    if let StepAction::Pipeline(target) = action {
        if !cfg.pipeline.contains_key(target) {
            return Err(TaskflowError::PipelineNotFound(format!(
                "{at} references unknown pipeline '{target}'"
            )));
        }
    }

    Ok(())
}

/// Pipeline references must form a DAG, otherwise building would recurse
/// forever.
fn validate_pipeline_graph(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: referencing pipeline -> referenced pipeline.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.pipeline.keys() {
        graph.add_node(name.as_str());
    }

    for (name, pipeline) in cfg.pipeline.iter() {
        for target in referenced_pipelines(pipeline) {
            if target == name.as_str() {
                return Err(TaskflowError::PipelineCycle(format!(
                    "pipeline '{name}' references itself"
                )));
            }
            graph.add_edge(name.as_str(), target, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(TaskflowError::PipelineCycle(format!(
            "cycle detected in pipeline references involving '{}'",
            cycle.node_id()
        ))),
    }
}

fn referenced_pipelines(pipeline: &PipelineConfig) -> Vec<&str> {
    let mut out = Vec::new();
    let top = pipeline
        .steps
        .iter()
        .chain(pipeline.rollback.iter())
        .chain(pipeline.completion.iter());
    for step in top {
        for s in std::iter::once(step)
            .chain(step.rollback.iter())
            .chain(step.completion.iter())
        {
            if let Some(target) = s.pipeline.as_deref() {
                out.push(target);
            }
        }
    }
    out
}

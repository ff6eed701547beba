// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Pipeline file as read from TOML, before validation.
///
/// ```toml
/// [settings]
/// stop_on_fail = true
/// default = "build"
///
/// [pipeline.build]
/// steps = [
///   { exec = "make", timeout = 600, rollback = [{ exec = "make clean" }] },
///   { tmp_dir = "scratch" },
/// ]
/// completion = [{ exec = "echo done" }]
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub settings: Settings,

    /// Pipelines from `[pipeline.<name>]`.
    #[serde(default)]
    pub pipeline: BTreeMap<String, PipelineConfig>,
}

/// Validated pipeline file. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub settings: Settings,
    pub pipeline: BTreeMap<String, PipelineConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        settings: Settings,
        pipeline: BTreeMap<String, PipelineConfig>,
    ) -> Self {
        Self { settings, pipeline }
    }

    /// Pipeline to run when none is named: `settings.default`, or the only
    /// pipeline if there is exactly one.
    pub fn default_pipeline(&self) -> Option<&str> {
        if let Some(name) = self.settings.default.as_deref() {
            return Some(name);
        }
        if self.pipeline.len() == 1 {
            return self.pipeline.keys().next().map(String::as_str);
        }
        None
    }
}

/// `[settings]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub stop_on_fail: bool,

    #[serde(default = "default_true")]
    pub rollback: bool,

    /// Pipeline run when the CLI names none.
    #[serde(default)]
    pub default: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stop_on_fail: true,
            rollback: true,
            default: None,
        }
    }
}

/// `[pipeline.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub steps: Vec<StepConfig>,

    /// Global rollback steps, run whenever the pipeline unwinds.
    #[serde(default)]
    pub rollback: Vec<StepConfig>,

    /// Steps run once at the end, whatever the outcome.
    #[serde(default)]
    pub completion: Vec<StepConfig>,

    /// Overrides `settings.stop_on_fail` for this pipeline.
    #[serde(default)]
    pub stop_on_fail: Option<bool>,
}

/// One step. Exactly one action field must be set.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    // Actions.
    #[serde(default)]
    pub exec: Option<String>,
    #[serde(default)]
    pub pipeline: Option<String>,
    #[serde(default)]
    pub mkdir: Option<String>,
    #[serde(default)]
    pub touch: Option<String>,
    #[serde(default)]
    pub remove: Option<String>,
    #[serde(default)]
    pub delete_dir: Option<String>,
    #[serde(default)]
    pub clean_dir: Option<String>,
    #[serde(default)]
    pub rotate_log: Option<String>,
    #[serde(default)]
    pub tmp_dir: Option<String>,

    /// Versions kept by `rotate_log`.
    #[serde(default)]
    pub keep: Option<u32>,

    // Exec modifiers.
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub input: Option<String>,
    /// Seconds.
    #[serde(default)]
    pub timeout: Option<f64>,
    /// Seconds.
    #[serde(default)]
    pub idle_timeout: Option<f64>,
    #[serde(default)]
    pub background: bool,
    #[serde(default)]
    pub interactive: bool,
    #[serde(default)]
    pub silent: bool,

    /// Rollback steps scoped to this step.
    #[serde(default)]
    pub rollback: Vec<StepConfig>,
    /// Completion steps scoped to this step.
    #[serde(default)]
    pub completion: Vec<StepConfig>,
}

/// The action a step performs, borrowed from its [`StepConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction<'a> {
    Exec(&'a str),
    Pipeline(&'a str),
    Mkdir(&'a str),
    Touch(&'a str),
    Remove(&'a str),
    DeleteDir(&'a str),
    CleanDir(&'a str),
    RotateLog(&'a str),
    TmpDir(&'a str),
}

impl StepConfig {
    /// All action fields that are set.
    pub fn actions(&self) -> Vec<StepAction<'_>> {
        let candidates = [
            self.exec.as_deref().map(StepAction::Exec),
            self.pipeline.as_deref().map(StepAction::Pipeline),
            self.mkdir.as_deref().map(StepAction::Mkdir),
            self.touch.as_deref().map(StepAction::Touch),
            self.remove.as_deref().map(StepAction::Remove),
            self.delete_dir.as_deref().map(StepAction::DeleteDir),
            self.clean_dir.as_deref().map(StepAction::CleanDir),
            self.rotate_log.as_deref().map(StepAction::RotateLog),
            self.tmp_dir.as_deref().map(StepAction::TmpDir),
        ];
        candidates.into_iter().flatten().collect()
    }

    /// The single action of a validated step.
    pub fn action(&self) -> Option<StepAction<'_>> {
        match self.actions().as_slice() {
            [one] => Some(*one),
            _ => None,
        }
    }

    /// Whether any exec-only modifier is set.
    pub fn has_exec_modifiers(&self) -> bool {
        self.dir.is_some()
            || self.env.is_some()
            || self.input.is_some()
            || self.timeout.is_some()
            || self.idle_timeout.is_some()
            || self.background
            || self.interactive
            || self.silent
    }
}

impl StepAction<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Exec(_) => "exec",
            StepAction::Pipeline(_) => "pipeline",
            StepAction::Mkdir(_) => "mkdir",
            StepAction::Touch(_) => "touch",
            StepAction::Remove(_) => "remove",
            StepAction::DeleteDir(_) => "delete_dir",
            StepAction::CleanDir(_) => "clean_dir",
            StepAction::RotateLog(_) => "rotate_log",
            StepAction::TmpDir(_) => "tmp_dir",
        }
    }

    pub fn argument(&self) -> &str {
        match *self {
            StepAction::Exec(s)
            | StepAction::Pipeline(s)
            | StepAction::Mkdir(s)
            | StepAction::Touch(s)
            | StepAction::Remove(s)
            | StepAction::DeleteDir(s)
            | StepAction::CleanDir(s)
            | StepAction::RotateLog(s)
            | StepAction::TmpDir(s) => s,
        }
    }
}

#![allow(dead_code)]

use taskflow::config::{ConfigFile, PipelineConfig, RawConfigFile, StepConfig};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_pipeline(mut self, name: &str, pipeline: PipelineConfig) -> Self {
        self.config.pipeline.insert(name.to_string(), pipeline);
        self
    }

    pub fn stop_on_fail(mut self, val: bool) -> Self {
        self.config.settings.stop_on_fail = val;
        self
    }

    pub fn rollback(mut self, val: bool) -> Self {
        self.config.settings.rollback = val;
        self
    }

    pub fn default_pipeline(mut self, name: &str) -> Self {
        self.config.settings.default = Some(name.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `PipelineConfig`.
#[derive(Default)]
pub struct PipelineBuilder {
    pipeline: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: StepConfig) -> Self {
        self.pipeline.steps.push(step);
        self
    }

    pub fn rollback(mut self, step: StepConfig) -> Self {
        self.pipeline.rollback.push(step);
        self
    }

    pub fn completion(mut self, step: StepConfig) -> Self {
        self.pipeline.completion.push(step);
        self
    }

    pub fn stop_on_fail(mut self, val: bool) -> Self {
        self.pipeline.stop_on_fail = Some(val);
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.pipeline
    }
}

/// Builder for `StepConfig`.
pub struct StepBuilder {
    step: StepConfig,
}

impl StepBuilder {
    pub fn exec(cmd: &str) -> Self {
        Self {
            step: StepConfig {
                exec: Some(cmd.to_string()),
                ..StepConfig::default()
            },
        }
    }

    pub fn pipeline(name: &str) -> Self {
        Self {
            step: StepConfig {
                pipeline: Some(name.to_string()),
                ..StepConfig::default()
            },
        }
    }

    pub fn mkdir(path: &str) -> Self {
        Self {
            step: StepConfig {
                mkdir: Some(path.to_string()),
                ..StepConfig::default()
            },
        }
    }

    pub fn touch(path: &str) -> Self {
        Self {
            step: StepConfig {
                touch: Some(path.to_string()),
                ..StepConfig::default()
            },
        }
    }

    pub fn remove(path: &str) -> Self {
        Self {
            step: StepConfig {
                remove: Some(path.to_string()),
                ..StepConfig::default()
            },
        }
    }

    pub fn rotate_log(path: &str, keep: u32) -> Self {
        Self {
            step: StepConfig {
                rotate_log: Some(path.to_string()),
                keep: Some(keep),
                ..StepConfig::default()
            },
        }
    }

    pub fn dir(mut self, dir: &str) -> Self {
        self.step.dir = Some(dir.to_string());
        self
    }

    pub fn timeout(mut self, secs: f64) -> Self {
        self.step.timeout = Some(secs);
        self
    }

    pub fn silent(mut self) -> Self {
        self.step.silent = true;
        self
    }

    pub fn on_rollback(mut self, step: StepConfig) -> Self {
        self.step.rollback.push(step);
        self
    }

    pub fn on_completion(mut self, step: StepConfig) -> Self {
        self.step.completion.push(step);
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}

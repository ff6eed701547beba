// src/tasks/rotate_log.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use regex::Regex;
use tracing::{debug, info};

use crate::errors::{Result, TaskflowError};
use crate::result::TaskResult;
use crate::task::{Task, TaskContext, TaskFuture};

const DEFAULT_KEEP: u32 = 3;

/// Rotates a log file: `app.log` becomes `app.log.1`, `app.log.1` becomes
/// `app.log.2` and so on up to `keep` versions. Older versions are removed
/// and a fresh empty `app.log` is left behind.
#[derive(Debug, Clone)]
pub struct RotateLog {
    name: String,
    path: PathBuf,
    keep: u32,
}

impl RotateLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("rotate {}", path.display()),
            path,
            keep: DEFAULT_KEEP,
        }
    }

    /// Number of rotated versions to keep. Must be at least 1.
    pub fn keep(mut self, keep: u32) -> Result<Self> {
        if keep == 0 {
            return Err(TaskflowError::config(format!(
                "rotate_log {}: keep must be at least 1",
                self.path.display()
            )));
        }
        self.keep = keep;
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kept_versions(&self) -> u32 {
        self.keep
    }

    fn rotate(&self) -> anyhow::Result<usize> {
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("{} has no usable file name", self.path.display()))?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).with_context(|| format!("creating dir {}", dir.display()))?;

        let pattern = Regex::new(&format!(r"^{}(?:\.(\d+))?$", regex::escape(file_name)))?;

        // (version, path); the live log is version 0.
        let mut versions: Vec<(u32, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("reading dir {}", dir.display()))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(caps) = pattern.captures(name) else {
                continue;
            };
            let version = match caps.get(1) {
                Some(m) => match m.as_str().parse::<u32>() {
                    Ok(v) => v,
                    Err(_) => continue,
                },
                None => 0,
            };
            versions.push((version, entry.path()));
        }
        versions.sort_by(|a, b| b.0.cmp(&a.0));

        let mut moved = 0;
        for (version, path) in versions {
            if version < self.keep {
                // The oldest kept version is overwritten by its successor.
                let target = dir.join(format!("{file_name}.{}", version + 1));
                if target.exists() {
                    fs::remove_file(&target)
                        .with_context(|| format!("removing {}", target.display()))?;
                }
                fs::rename(&path, &target).with_context(|| {
                    format!("renaming {} to {}", path.display(), target.display())
                })?;
                debug!(from = %path.display(), to = %target.display(), "rotated");
                moved += 1;
            } else if version > self.keep {
                fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
                debug!(path = %path.display(), "dropped old log version");
            }
        }

        fs::File::create(&self.path)
            .with_context(|| format!("creating {}", self.path.display()))?;
        Ok(moved)
    }
}

impl Task for RotateLog {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a mut self, _ctx: &'a mut TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            info!("Rotating {} (keep {})", self.path.display(), self.keep);
            match self.rotate() {
                Ok(moved) => TaskResult::success(self.name.clone()).with_data("rotated", moved),
                Err(e) => TaskResult::from_error(self.name.clone(), &e),
            }
        })
    }
}

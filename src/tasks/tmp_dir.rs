// src/tasks/tmp_dir.rs

//! Two-phase temporary directories.
//!
//! The path is decided when the task is built so later tasks can be
//! configured with it; the directory itself only appears when the task runs,
//! and its deletion is registered as a completion of the enclosing
//! collection at that point.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};
use uuid::Uuid;

use crate::result::TaskResult;
use crate::task::{Task, TaskContext, TaskFuture};
use crate::tasks::filesystem::FilesystemStack;

#[derive(Debug, Clone)]
pub struct TmpDir {
    name: String,
    base: PathBuf,
    prefix: String,
    random: String,
}

impl TmpDir {
    /// Reserve a path under the system temporary directory.
    pub fn reserve(prefix: impl Into<String>) -> Self {
        Self::reserve_in(prefix, env::temp_dir())
    }

    /// Reserve a path under `base`. Nothing touches the disk yet.
    pub fn reserve_in(prefix: impl Into<String>, base: impl Into<PathBuf>) -> Self {
        let prefix = prefix.into();
        Self {
            name: format!("tmp dir {prefix}"),
            base: base.into(),
            prefix,
            random: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Use the bare prefix as directory name.
    pub fn without_random_part(mut self) -> Self {
        self.random.clear();
        self
    }

    /// The reserved path. Stable across calls, whether or not the
    /// directory exists.
    pub fn path(&self) -> PathBuf {
        self.base.join(format!("{}{}", self.prefix, self.random))
    }

    /// Create the directory (and missing parents).
    pub fn materialize(&self) -> anyhow::Result<PathBuf> {
        let path = self.path();
        fs::create_dir_all(&path)
            .with_context(|| format!("creating temporary dir {}", path.display()))?;
        Ok(path)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl Task for TmpDir {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a mut self, ctx: &'a mut TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            let path = match self.materialize() {
                Ok(path) => path,
                Err(e) => return TaskResult::from_error(self.name.clone(), &e),
            };
            info!("Created temporary directory {}", path.display());

            ctx.defer_completion(
                FilesystemStack::new()
                    .named(format!("remove {}", path.display()))
                    .delete_dir(&path),
            );
            debug!(path = %path.display(), "deletion registered as completion");

            TaskResult::success(self.name.clone())
                .with_data("path", path.to_string_lossy().into_owned())
        })
    }
}

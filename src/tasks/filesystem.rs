// src/tasks/filesystem.rs

//! A stack of filesystem operations run as one task.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::result::TaskResult;
use crate::task::{Task, TaskContext, TaskFuture};

/// One queued filesystem operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsOp {
    /// Create a directory and its parents.
    Mkdir(PathBuf),
    /// Create an empty file, or leave an existing one alone.
    Touch(PathBuf),
    /// Remove a file or a whole directory tree. Missing paths are fine.
    Remove(PathBuf),
    Rename { from: PathBuf, to: PathBuf },
    /// Copy a single file, creating the destination's parent directories.
    Copy { from: PathBuf, to: PathBuf },
    /// Remove a directory tree. Missing directories are fine.
    DeleteDir(PathBuf),
    /// Empty a directory but keep it.
    CleanDir(PathBuf),
}

impl FsOp {
    fn apply(&self) -> Result<()> {
        match self {
            FsOp::Mkdir(dir) => {
                fs::create_dir_all(dir).with_context(|| format!("creating dir {}", dir.display()))
            }
            FsOp::Touch(file) => {
                if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("creating dir {}", parent.display()))?;
                }
                fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(file)
                    .with_context(|| format!("touching {}", file.display()))?;
                Ok(())
            }
            FsOp::Remove(path) => remove_path(path),
            FsOp::Rename { from, to } => fs::rename(from, to).with_context(|| {
                format!("renaming {} to {}", from.display(), to.display())
            }),
            FsOp::Copy { from, to } => {
                if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("creating dir {}", parent.display()))?;
                }
                fs::copy(from, to)
                    .map(|_| ())
                    .with_context(|| format!("copying {} to {}", from.display(), to.display()))
            }
            FsOp::DeleteDir(dir) => {
                if !dir.exists() {
                    return Ok(());
                }
                fs::remove_dir_all(dir).with_context(|| format!("deleting dir {}", dir.display()))
            }
            FsOp::CleanDir(dir) => {
                let entries =
                    fs::read_dir(dir).with_context(|| format!("reading dir {}", dir.display()))?;
                for entry in entries {
                    let entry = entry?;
                    remove_path(&entry.path())?;
                }
                Ok(())
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            FsOp::Mkdir(p) => format!("mkdir {}", p.display()),
            FsOp::Touch(p) => format!("touch {}", p.display()),
            FsOp::Remove(p) => format!("remove {}", p.display()),
            FsOp::Rename { from, to } => format!("rename {} {}", from.display(), to.display()),
            FsOp::Copy { from, to } => format!("copy {} {}", from.display(), to.display()),
            FsOp::DeleteDir(p) => format!("delete dir {}", p.display()),
            FsOp::CleanDir(p) => format!("clean dir {}", p.display()),
        }
    }
}

fn remove_path(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("inspecting {}", path.display())),
        Ok(meta) if meta.is_dir() => {
            fs::remove_dir_all(path).with_context(|| format!("removing dir {}", path.display()))
        }
        Ok(_) => fs::remove_file(path).with_context(|| format!("removing {}", path.display())),
    }
}

/// Queued filesystem operations, applied in order when the task runs.
///
/// The first failing operation stops the stack and becomes the task's
/// failing result.
#[derive(Debug, Clone, Default)]
pub struct FilesystemStack {
    name: String,
    ops: Vec<FsOp>,
}

impl FilesystemStack {
    pub fn new() -> Self {
        Self {
            name: "filesystem".to_string(),
            ops: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn op(mut self, op: FsOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn mkdir(self, dir: impl Into<PathBuf>) -> Self {
        self.op(FsOp::Mkdir(dir.into()))
    }

    pub fn touch(self, file: impl Into<PathBuf>) -> Self {
        self.op(FsOp::Touch(file.into()))
    }

    pub fn remove(self, path: impl Into<PathBuf>) -> Self {
        self.op(FsOp::Remove(path.into()))
    }

    pub fn rename(self, from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        self.op(FsOp::Rename {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn copy(self, from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        self.op(FsOp::Copy {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn delete_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.op(FsOp::DeleteDir(dir.into()))
    }

    pub fn clean_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.op(FsOp::CleanDir(dir.into()))
    }

    pub fn ops(&self) -> &[FsOp] {
        &self.ops
    }

    fn apply_all(&self) -> TaskResult {
        for op in &self.ops {
            let what = op.describe();
            info!(task = %self.name, "{what}");
            if let Err(e) = op.apply() {
                return TaskResult::from_error(self.name.clone(), &e).with_data("operation", what);
            }
            debug!(task = %self.name, op = %what, "filesystem operation done");
        }
        TaskResult::success(self.name.clone()).with_data("operations", self.ops.len())
    }
}

impl Task for FilesystemStack {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a mut self, _ctx: &'a mut TaskContext) -> TaskFuture<'a> {
        Box::pin(async move { self.apply_all() })
    }
}

// src/tasks/mod.rs

//! Leaf tasks that are not processes.

pub mod code;
pub mod filesystem;
pub mod rotate_log;
pub mod tmp_dir;

pub use code::CodeTask;
pub use filesystem::{FilesystemStack, FsOp};
pub use rotate_log::RotateLog;
pub use tmp_dir::TmpDir;

// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Only caller defects travel through these types: invalid configuration and
//! misuse of the collection protocol. Runtime failures of tasks are reported
//! as failing [`TaskResult`](crate::result::TaskResult)s instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Protocol misuse: {0}")]
    ProtocolMisuse(String),

    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("Cycle detected in pipelines: {0}")]
    PipelineCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskflowError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        TaskflowError::ConfigError(msg.into())
    }

    pub(crate) fn misuse(msg: impl Into<String>) -> Self {
        TaskflowError::ProtocolMisuse(msg.into())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskflowError>;

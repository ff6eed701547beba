// src/config/mod.rs

//! Pipeline files.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a file from disk.
//! - `validate.rs`: `RawConfigFile` -> `ConfigFile` checks.
//! - `build.rs`: validated config -> [`Collection`](crate::collection::Collection).

pub mod build;
pub mod loader;
pub mod model;
pub mod validate;

pub use build::{BuildOptions, build_pipeline};
pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, PipelineConfig, RawConfigFile, Settings, StepAction, StepConfig};

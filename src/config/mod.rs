// src/config/mod.rs

//! Configuration loading and validation for pipedag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate task shapes (`validate.rs`). Graph checks happen when the
//!   config becomes a [`crate::pipeline::Pipeline`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{
    render_options, ConfigFile, ConfigSection, DefaultSection, RawConfigFile, TaskConfig,
};
pub use validate::validate_raw_config;

// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig};
use crate::errors::{PipedagError, Result};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PipedagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.default, raw.task))
    }
}

/// Shape checks on a raw config.
///
/// Dependency names and cycles are left to `Pipeline::validate`, which
/// reports them as `UnknownDependency` / `CyclicDependency`.
pub fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    for (name, task) in cfg.task.iter() {
        validate_task(name, task)?;
    }
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(PipedagError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if let Some(target) = &cfg.config.default_target {
        if !cfg.task.contains_key(target) {
            return Err(PipedagError::ConfigError(format!(
                "[config].default_target '{}' is not a declared task",
                target
            )));
        }
    }

    if let Some(timeout) = &cfg.default.timeout {
        parse_duration(timeout).map_err(|e| {
            PipedagError::ConfigError(format!("[default].timeout is invalid: {e}"))
        })?;
    }

    Ok(())
}

fn validate_task(name: &str, task: &TaskConfig) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PipedagError::ConfigError(
            "task names must not be empty".to_string(),
        ));
    }

    if task.cmd.is_some() && task.program.is_some() {
        return Err(PipedagError::ConfigError(format!(
            "task '{}' sets both `cmd` and `program`; pick one",
            name
        )));
    }

    if task.program.is_none() && (!task.args.is_empty() || !task.options.is_empty()) {
        return Err(PipedagError::ConfigError(format!(
            "task '{}' sets `args`/`options` without a `program`",
            name
        )));
    }

    if task.is_group()
        && (task.stdout_to.is_some() || task.timeout.is_some() || !task.env.is_empty())
    {
        return Err(PipedagError::ConfigError(format!(
            "task '{}' has no `cmd` or `program`, so `stdout_to`, `timeout` and `env` do not apply",
            name
        )));
    }

    if let Some(cmd) = &task.cmd {
        if cmd.trim().is_empty() {
            return Err(PipedagError::ConfigError(format!(
                "task '{}' has an empty `cmd`",
                name
            )));
        }
    }

    if let Some(program) = &task.program {
        if program.trim().is_empty() {
            return Err(PipedagError::ConfigError(format!(
                "task '{}' has an empty `program`",
                name
            )));
        }
    }

    task.program_args().map_err(|e| {
        PipedagError::ConfigError(format!("task '{}' has invalid `options`: {}", name, e))
    })?;

    if let Some(timeout) = &task.timeout {
        parse_duration(timeout).map_err(|e| {
            PipedagError::ConfigError(format!("task '{}' has an invalid `timeout`: {}", name, e))
        })?;
    }

    if task.after.iter().any(|dep| dep == name) {
        return Err(PipedagError::ConfigError(format!(
            "task '{}' cannot depend on itself in `after`",
            name
        )));
    }

    Ok(())
}

// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::FailurePolicy;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// default_target = "deploy"
/// on_failure = "continue"
///
/// [default]
/// env = { JEKYLL_ENV = "production" }
///
/// [task.build]
/// cmd = "jekyll build -d dist"
///
/// [task.deploy]
/// after = ["build"]
/// cmd = "gh-pages -d dist"
/// ```
///
/// All sections are optional and have reasonable defaults. Use
/// `ConfigFile::try_from` to obtain a validated [`ConfigFile`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Defaults shared by every command task, from `[default]`.
    #[serde(default)]
    pub default: DefaultSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders can rely on the action shapes, durations and option values being
/// well formed. Dependency names are checked later, when the config is turned
/// into a `Pipeline`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub default: DefaultSection,
    pub task: BTreeMap<String, TaskConfig>,
    /// Directory relative paths (`cwd`, `stdout_to`) are resolved against.
    ///
    /// The loader sets this to the directory holding the config file.
    pub base_dir: PathBuf,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        default: DefaultSection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            default,
            task,
            base_dir: PathBuf::from("."),
        }
    }

    /// Return a copy rooted at `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Resolve a config-relative path.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigSection {
    /// Task run when the CLI is invoked without a task name.
    #[serde(default)]
    pub default_target: Option<String>,

    /// `"continue"` (default) or `"fail-fast"`.
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

/// `[default]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSection {
    /// Environment variables set for every command; task `env` wins on
    /// conflicts.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Working directory for commands without their own `cwd`.
    #[serde(default)]
    pub cwd: Option<String>,

    /// Timeout for commands without their own `timeout`, e.g. `"10m"`.
    #[serde(default)]
    pub timeout: Option<String>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Shell command line (`sh -c` on unix, `cmd /C` on windows).
    #[serde(default)]
    pub cmd: Option<String>,

    /// External program run directly, without a shell.
    #[serde(default)]
    pub program: Option<String>,

    /// Positional arguments for `program`.
    #[serde(default)]
    pub args: Vec<String>,

    /// Tool options for `program`, rendered as `--key value` flags after
    /// `args`.
    #[serde(default)]
    pub options: BTreeMap<String, toml::Value>,

    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Working directory, relative to the config file.
    #[serde(default)]
    pub cwd: Option<String>,

    /// Per-task timeout, e.g. `"30s"`.
    #[serde(default)]
    pub timeout: Option<String>,

    /// Write the captured stdout of the command to this file.
    #[serde(default)]
    pub stdout_to: Option<String>,

    /// Free-form description shown by `--list`.
    #[serde(default)]
    pub description: Option<String>,
}

impl TaskConfig {
    /// A task with neither `cmd` nor `program` only groups its dependencies.
    pub fn is_group(&self) -> bool {
        self.cmd.is_none() && self.program.is_none()
    }

    /// Full argument vector for `program`: positional `args` followed by the
    /// rendered `options`.
    pub fn program_args(&self) -> Result<Vec<String>, String> {
        let mut argv = self.args.clone();
        argv.extend(render_options(&self.options)?);
        Ok(argv)
    }
}

/// Render a tool option table as command-line flags.
///
/// - strings and numbers: `--key value`
/// - `true`: `--key`; `false`: omitted
/// - arrays: the flag repeated once per element
///
/// Keys are used verbatim and emitted in sorted order.
pub fn render_options(options: &BTreeMap<String, toml::Value>) -> Result<Vec<String>, String> {
    let mut argv = Vec::new();
    for (key, value) in options {
        push_option(&mut argv, key, value, false)?;
    }
    Ok(argv)
}

fn push_option(
    argv: &mut Vec<String>,
    key: &str,
    value: &toml::Value,
    nested: bool,
) -> Result<(), String> {
    let flag = format!("--{key}");
    match value {
        toml::Value::String(s) => {
            argv.push(flag);
            argv.push(s.clone());
        }
        toml::Value::Integer(i) => {
            argv.push(flag);
            argv.push(i.to_string());
        }
        toml::Value::Float(f) => {
            argv.push(flag);
            argv.push(f.to_string());
        }
        toml::Value::Boolean(true) => argv.push(flag),
        toml::Value::Boolean(false) => {}
        toml::Value::Array(items) if !nested => {
            for item in items {
                push_option(argv, key, item, true)?;
            }
        }
        toml::Value::Array(_) => {
            return Err(format!("option '{key}' contains a nested array"));
        }
        toml::Value::Datetime(_) | toml::Value::Table(_) => {
            return Err(format!(
                "option '{key}' must be a string, number, boolean or array"
            ));
        }
    }
    Ok(())
}

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;

use pipedag::config::{ConfigFile, ConfigSection, DefaultSection, RawConfigFile, TaskConfig};
use pipedag::errors::Result;
use pipedag::types::FailurePolicy;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                default: DefaultSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn default_target(mut self, name: &str) -> Self {
        self.config.config.default_target = Some(name.to_string());
        self
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.config.config.on_failure = policy;
        self
    }

    pub fn with_default_env(mut self, key: &str, value: &str) -> Self {
        self.config
            .default
            .env
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_default_timeout(mut self, timeout: &str) -> Self {
        self.config.default.timeout = Some(timeout.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }

    /// Build with relative paths rooted at `dir`.
    pub fn build_in(self, dir: &Path) -> ConfigFile {
        self.build().with_base_dir(dir)
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// Task running a shell command line.
    pub fn shell(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// Task running a program without a shell.
    pub fn program(program: &str) -> Self {
        Self {
            task: TaskConfig {
                program: Some(program.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// Task that only groups its dependencies.
    pub fn group() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.task.args.push(arg.to_string());
        self
    }

    pub fn option(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.task.options.insert(key.to_string(), value.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.task.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.task.timeout = Some(timeout.to_string());
        self
    }

    pub fn stdout_to(mut self, path: &str) -> Self {
        self.task.stdout_to = Some(path.to_string());
        self
    }

    pub fn cwd(mut self, dir: &str) -> Self {
        self.task.cwd = Some(dir.to_string());
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.task.description = Some(text.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

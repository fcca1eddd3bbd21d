// src/errors.rs

//! Crate-wide error types.
//!
//! - [`PipedagError`] is what every fallible public API returns.
//! - [`ActionFailure`] is the error an individual task action reports.
//! - [`PipelineError`] aggregates the action failures of one run.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::engine::TaskName;

#[derive(Error, Debug)]
pub enum PipedagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Task '{0}' is already registered")]
    DuplicateTask(TaskName),

    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency {
        task: TaskName,
        dependency: TaskName,
    },

    #[error("Task not found: {0}")]
    UnknownTask(TaskName),

    #[error("Cyclic dependency between tasks: {}", .0.join(", "))]
    CyclicDependency(Vec<TaskName>),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Run of '{0}' was interrupted")]
    Interrupted(TaskName),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipedagError>;

/// Why a single task action failed.
///
/// Values are cheap to clone so they can travel through the runtime event
/// channel and end up in both the run report and the final error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionFailure {
    /// The external process ran but exited unsuccessfully.
    ///
    /// `code` is `-1` when the process was terminated by a signal.
    #[error("exited with code {code}")]
    ExitStatus { code: i32, stderr_tail: Vec<String> },

    #[error("failed to spawn '{program}': {message}")]
    Spawn { program: String, message: String },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("failed to write output to {path:?}: {message}")]
    Output { path: PathBuf, message: String },

    #[error("{0}")]
    Message(String),
}

impl ActionFailure {
    pub fn message(msg: impl Into<String>) -> Self {
        ActionFailure::Message(msg.into())
    }
}

/// One failed task in a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: TaskName,
    pub error: ActionFailure,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task '{}' {}", self.task, self.error)
    }
}

/// Aggregated run-time failure of `Pipeline::run`.
///
/// Lists every task whose action failed (in the order the failures were
/// observed) and every task that was skipped because of them.
#[derive(Error, Debug, Clone)]
#[error("pipeline run for '{target}' failed: {}", join_failures(.failures))]
pub struct PipelineError {
    pub target: TaskName,
    pub failures: Vec<TaskFailure>,
    pub skipped: Vec<TaskName>,
}

impl PipelineError {
    /// Names of the tasks whose own action failed.
    pub fn failed_tasks(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.task.as_str()).collect()
    }
}

fn join_failures(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

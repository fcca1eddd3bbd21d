// src/dag/task_info.rs

//! Task metadata and per-run state.

use std::fmt;
use std::sync::Arc;

use crate::engine::TaskName;
use crate::exec::Action;

/// Per-run state of a task (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Required by this run, waiting on dependencies.
    Pending,
    /// Handed to the executor; the action is in flight.
    Running,
    /// The action completed without error.
    Succeeded,
    /// The action reported an error.
    Failed,
    /// Never invoked because a dependency failed (or the run stopped
    /// scheduling under fail-fast).
    Skipped,
}

/// Public, read-only view of a task's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskRunState {
    /// The task is not required by the current run.
    NotInRun,
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl TaskRunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskRunState::Succeeded | TaskRunState::Failed | TaskRunState::Skipped
        )
    }
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::Succeeded) => TaskRunState::Succeeded,
            Some(RunState::Failed) => TaskRunState::Failed,
            Some(RunState::Skipped) => TaskRunState::Skipped,
        }
    }
}

impl fmt::Display for TaskRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskRunState::NotInRun => "not-in-run",
            TaskRunState::Pending => "pending",
            TaskRunState::Running => "running",
            TaskRunState::Succeeded => "succeeded",
            TaskRunState::Failed => "failed",
            TaskRunState::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Static task information plus per-run state.
#[derive(Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    pub action: Arc<dyn Action>,
    /// Direct dependencies for this task.
    pub deps: Vec<TaskName>,

    /// Per-run state (None if not participating in the current run).
    pub run_state: Option<RunState>,
}

impl TaskInfo {
    pub fn new(name: TaskName, deps: Vec<TaskName>, action: Arc<dyn Action>) -> Self {
        Self {
            name,
            action,
            deps,
            run_state: None,
        }
    }
}

impl fmt::Debug for TaskInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskInfo")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("run_state", &self.run_state)
            .finish_non_exhaustive()
    }
}

/// Description of a task that the scheduler wants the executor to run now.
#[derive(Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub action: Arc<dyn Action>,
    /// Identifier of the pipeline run this invocation belongs to.
    pub run_id: u64,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo, run_id: u64) -> Self {
        Self {
            name: info.name.clone(),
            action: Arc::clone(&info.action),
            run_id,
        }
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

// src/engine/report.rs

//! Summary of one pipeline run.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::dag::TaskRunState;
use crate::engine::TaskName;
use crate::errors::{PipedagError, PipelineError, Result, TaskFailure};
use crate::exec::ActionOutput;

/// What happened during a run of one target.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub target: TaskName,
    pub run_id: u64,
    /// Tasks in the order they were handed to the executor.
    pub started: Vec<TaskName>,
    /// Final state of every task the run required.
    pub states: BTreeMap<TaskName, TaskRunState>,
    /// Output of every task whose action succeeded.
    pub outputs: BTreeMap<TaskName, ActionOutput>,
    /// Failed actions, in the order the failures were observed.
    pub failures: Vec<TaskFailure>,
    /// The run was stopped before every task reached a terminal state.
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn new(target: impl Into<TaskName>, run_id: u64) -> Self {
        Self {
            target: target.into(),
            run_id,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        !self.interrupted
            && self.failures.is_empty()
            && self.states.values().all(|s| *s == TaskRunState::Succeeded)
    }

    pub fn state_of(&self, task: &str) -> TaskRunState {
        self.states
            .get(task)
            .copied()
            .unwrap_or(TaskRunState::NotInRun)
    }

    /// Tasks that ended the run in `state`, sorted by name.
    pub fn tasks_in_state(&self, state: TaskRunState) -> Vec<TaskName> {
        self.states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn skipped(&self) -> Vec<TaskName> {
        self.tasks_in_state(TaskRunState::Skipped)
    }

    pub fn output_of(&self, task: &str) -> Option<&ActionOutput> {
        self.outputs.get(task)
    }

    /// Turn the report into the public run result.
    ///
    /// - interrupted runs become `PipedagError::Interrupted`
    /// - runs with failed actions become `PipedagError::Pipeline`
    pub fn into_result(self) -> Result<RunReport> {
        if self.interrupted {
            return Err(PipedagError::Interrupted(self.target));
        }
        if !self.failures.is_empty() {
            return Err(PipedagError::Pipeline(PipelineError {
                skipped: self.skipped(),
                target: self.target,
                failures: self.failures,
            }));
        }
        Ok(self)
    }
}

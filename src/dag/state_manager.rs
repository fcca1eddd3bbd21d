// src/dag/state_manager.rs

//! Per-run state management for tasks in the scheduler.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::dag::DagGraph;
use crate::engine::TaskName;

/// Manages per-run state transitions for tasks.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        current_run_id: Option<u64>,
    ) -> Self {
        Self {
            graph,
            tasks,
            current_run_id,
        }
    }

    /// Include `target` and everything upstream of it in this run.
    ///
    /// Tasks that were not yet part of the run (`run_state == None`) are
    /// marked `Pending`; tasks already participating keep their state.
    pub fn mark_target_and_dependencies_pending(&mut self, target: &str) {
        let mut stack: Vec<TaskName> = vec![target.to_string()];
        let mut visited: HashSet<TaskName> = HashSet::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }

            if let Some(info) = self.tasks.get_mut(&name) {
                if info.run_state.is_none() {
                    info.run_state = Some(RunState::Pending);
                    debug!(task = %info.name, run_id = self.current_run_id, "marked Pending for this run");
                }

                stack.extend(self.graph.dependencies_of(&name).iter().cloned());
            } else {
                warn!(task = %name, "node in DAG not present in tasks map");
            }
        }
    }

    /// Mark every `Pending` dependent (transitively) of a failed task as
    /// `Skipped`.
    ///
    /// Returns the tasks that were newly skipped.
    pub fn mark_dependents_skipped(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<TaskName> = self.graph.dependents_of(failed_task).to_vec();
        let mut newly_skipped = Vec::new();

        while let Some(name) = stack.pop() {
            if let Some(info) = self.tasks.get_mut(&name) {
                match info.run_state {
                    Some(RunState::Pending) => {
                        info.run_state = Some(RunState::Skipped);
                        debug!(
                            task = %info.name,
                            upstream = %failed_task,
                            "skipping dependent due to upstream failure"
                        );
                        newly_skipped.push(info.name.clone());
                        stack.extend(self.graph.dependents_of(&name).iter().cloned());
                    }
                    Some(RunState::Running) => {
                        // A running task's dependencies all succeeded, so it
                        // can't be downstream of this failure.
                        warn!(task = %info.name, "running task downstream of a failure");
                    }
                    Some(RunState::Succeeded)
                    | Some(RunState::Failed)
                    | Some(RunState::Skipped)
                    | None => {
                        // Either already terminal or not participating in this run.
                    }
                }
            }
        }

        newly_skipped
    }

    /// Mark every task still `Pending` in this run as `Skipped`.
    pub fn skip_all_pending(&mut self) -> Vec<TaskName> {
        let mut skipped = Vec::new();
        for info in self.tasks.values_mut() {
            if info.run_state == Some(RunState::Pending) {
                info.run_state = Some(RunState::Skipped);
                skipped.push(info.name.clone());
            }
        }
        skipped.sort();
        skipped
    }

    /// Collect tasks that are `Pending` and whose dependencies all succeeded,
    /// mark them as `Running`, and return them as `ScheduledTask`s.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let mut ready = Vec::new();

        // Decide first, then mutate to avoid borrowing issues.
        let ro = ReadOnlyStateManager::new(&*self.tasks);
        let mut candidates: Vec<TaskName> = self
            .tasks
            .values()
            .filter_map(|info| {
                if matches!(info.run_state, Some(RunState::Pending))
                    && ro.deps_satisfied_for_info(info)
                {
                    Some(info.name.clone())
                } else {
                    None
                }
            })
            .collect();
        candidates.sort();

        for name in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                info!(
                    task = %info.name,
                    run_id = self.current_run_id,
                    "dependencies satisfied; scheduling task"
                );

                info.run_state = Some(RunState::Running);
                ready.push(ScheduledTask::from_task_info(
                    info,
                    self.current_run_id.unwrap_or(0),
                ));
            }
        }

        ready
    }

    /// Check if all tasks are in a terminal state.
    pub fn all_tasks_terminal(&self) -> bool {
        !self.tasks.values().any(|info| {
            matches!(
                info.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            )
        })
    }
}

/// A read-only view for checking dependency satisfaction.
///
/// Used when we only have shared access to the tasks map (e.g. in
/// `Scheduler::deps_satisfied`).
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a HashMap<TaskName, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a HashMap<TaskName, TaskInfo>) -> Self {
        Self { tasks }
    }

    /// A task may start only once every dependency has `Succeeded` in the
    /// current run. There is no carry-over between runs.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.deps.iter().all(|dep_name| match self.tasks.get(dep_name) {
            Some(dep) => dep.run_state == Some(RunState::Succeeded),
            None => {
                warn!(
                    task = %info.name,
                    dep = %dep_name,
                    "dependency missing from tasks map"
                );
                false
            }
        })
    }
}

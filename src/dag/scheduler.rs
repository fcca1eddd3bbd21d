// src/dag/scheduler.rs

use std::collections::HashMap;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{RunState, TaskInfo, TaskRunState};
use crate::engine::{TaskName, TaskOutcome};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::types::FailurePolicy;

/// Scheduler holds the immutable DAG plus the per-run state table.
///
/// It is responsible for:
/// - remembering which tasks the current run requires
/// - deciding when a required task is "ready" (all deps succeeded)
/// - marking tasks as succeeded/failed
/// - skipping dependents of failed tasks
///
/// It performs no IO; the engine feeds it completions one at a time, so every
/// state transition has a single writer.
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    tasks: HashMap<TaskName, TaskInfo>,
    policy: FailurePolicy,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
    /// Target of the active (or last) run.
    target: Option<TaskName>,
    /// Set under fail-fast once a task failed; nothing new starts.
    halted: bool,
}

impl Scheduler {
    pub fn new(
        graph: DagGraph,
        tasks: impl IntoIterator<Item = TaskInfo>,
        policy: FailurePolicy,
    ) -> Self {
        let tasks = tasks
            .into_iter()
            .map(|info| (info.name.clone(), info))
            .collect();

        Self {
            graph,
            tasks,
            policy,
            run_counter: 0,
            current_run_id: None,
            target: None,
            halted: false,
        }
    }

    /// Construct a scheduler over every task of a pipeline.
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        let tasks = pipeline.tasks().map(|task| {
            TaskInfo::new(
                task.id().to_string(),
                task.dependencies().to_vec(),
                task.action(),
            )
        });
        Self::new(pipeline.graph().clone(), tasks, pipeline.failure_policy())
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Continue run numbering after `last_run_id`.
    pub fn with_run_counter(mut self, last_run_id: u64) -> Self {
        self.run_counter = last_run_id;
        self
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Current run ID, if any.
    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    /// ID of the most recently started run.
    pub fn last_run_id(&self) -> u64 {
        self.run_counter
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Read-only view of the given task's run state.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.into())
    }

    /// Names of tasks participating in the latest run, with their states.
    ///
    /// Unlike [`Scheduler::tasks_in_current_run`] this keeps answering after
    /// the run finished, which is what the run report needs.
    pub fn run_states(&self) -> Vec<(TaskName, TaskRunState)> {
        let mut states: Vec<(TaskName, TaskRunState)> = self
            .tasks
            .values()
            .filter(|info| info.run_state.is_some())
            .map(|info| (info.name.clone(), info.run_state.into()))
            .collect();
        states.sort();
        states
    }

    /// Names of tasks that are currently participating in the *active* run.
    ///
    /// If there is no active run this returns an empty vector, even though
    /// tasks may still have a terminal state from the previous run.
    pub fn tasks_in_current_run(&self) -> Vec<TaskName> {
        if self.current_run_id.is_none() {
            return Vec::new();
        }

        let mut names: Vec<TaskName> = self
            .tasks
            .values()
            .filter(|info| info.run_state.is_some())
            .map(|info| info.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Whether the dependencies of `task` are satisfied for the *current run*.
    ///
    /// Returns `None` if the task is unknown.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        let info = self.tasks.get(task)?;
        let mgr = ReadOnlyStateManager::new(&self.tasks);
        Some(mgr.deps_satisfied_for_info(info))
    }

    /// Start a run for `target`.
    ///
    /// The target's subgraph is planned before any state changes, so unknown
    /// tasks and cycles leave the scheduler untouched.
    pub fn step_start(&mut self, target: &str) -> Result<SchedulerStep> {
        if let Some(run_id) = self.current_run_id {
            return Err(anyhow!("run {run_id} is still active; cannot start '{target}'").into());
        }

        let order = self.graph.topological_order(target)?;

        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);
        self.target = Some(target.to_string());
        self.halted = false;

        for info in self.tasks.values_mut() {
            info.run_state = None;
        }

        info!(
            run_id = self.run_counter,
            goal = %target,
            plan = ?order,
            "scheduler: starting run"
        );

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        manager.mark_target_and_dependencies_pending(target);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        Ok(SchedulerStep {
            newly_scheduled,
            run_just_finished,
            ..SchedulerStep::default()
        })
    }

    /// Apply the outcome of a task action.
    pub fn step_completion(&mut self, task: &str, outcome: &TaskOutcome) -> SchedulerStep {
        self.completion_step_internal(task, outcome)
    }

    /// Determine whether all tasks are in a terminal state and clear
    /// `current_run_id` if so.
    ///
    /// Returns `true` if this call transitioned the scheduler from running
    /// to idle.
    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }

        let manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);

        if manager.all_tasks_terminal() {
            info!(
                run_id = self.current_run_id,
                "scheduler: all tasks terminal; marking run as finished"
            );
            self.current_run_id = None;
            true
        } else {
            false
        }
    }

    fn completion_step_internal(&mut self, task: &str, outcome: &TaskOutcome) -> SchedulerStep {
        let run_id = match self.current_run_id {
            Some(id) => id,
            None => {
                warn!(
                    task = %task,
                    "completion with no active run; ignoring"
                );
                return SchedulerStep::default();
            }
        };

        let mut step = SchedulerStep::default();

        match self.tasks.get_mut(task) {
            Some(info) if info.run_state == Some(RunState::Running) => match outcome {
                TaskOutcome::Success(_) => {
                    info.run_state = Some(RunState::Succeeded);
                    debug!(task = %info.name, run_id, "task succeeded");
                    if !self.halted {
                        let mut manager =
                            StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                        step.newly_scheduled = manager.collect_new_ready_tasks();
                    }
                }
                TaskOutcome::Failed(error) => {
                    info.run_state = Some(RunState::Failed);
                    warn!(
                        task = %info.name,
                        run_id,
                        error = %error,
                        "task failed; skipping dependents in this run"
                    );
                    step.newly_failed.push(info.name.clone());

                    let mut manager =
                        StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                    step.newly_skipped = manager.mark_dependents_skipped(task);

                    if self.policy == FailurePolicy::FailFast {
                        let mut rest = manager.skip_all_pending();
                        if !rest.is_empty() {
                            info!(
                                run_id,
                                skipped = ?rest,
                                "fail-fast: not starting remaining tasks"
                            );
                        }
                        step.newly_skipped.append(&mut rest);
                        self.halted = true;
                    }
                }
            },
            Some(info) => {
                warn!(
                    task = %task,
                    run_id,
                    state = ?info.run_state,
                    "completion for a task that is not running; ignoring"
                );
            }
            None => {
                warn!(task = %task, "completion for unknown task; ignoring");
            }
        }

        step.run_just_finished = self.maybe_finish_run();
        step
    }
}

// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{info, warn};

use crate::dag::{ScheduledTask, Scheduler};
use crate::engine::report::RunReport;
use crate::engine::{TaskName, TaskOutcome};
use crate::errors::{Result, TaskFailure};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// The run is over; the shell should stop reading events.
    RequestExit,
}

/// Decision returned by the core after handling a single input.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn from_parts(dispatch: Vec<ScheduledTask>, finished: bool) -> Self {
        let mut commands = Vec::new();
        if !dispatch.is_empty() {
            commands.push(CoreCommand::DispatchTasks(dispatch));
        }
        if finished {
            commands.push(CoreCommand::RequestExit);
        }
        CoreStep {
            commands,
            keep_running: !finished,
        }
    }
}

/// Plan and start a run for `target`, returning the fresh report and the
/// first tasks to dispatch.
pub fn handle_run_start(scheduler: &mut Scheduler, target: &str) -> Result<(RunReport, CoreStep)> {
    let step = scheduler.step_start(target)?;
    let mut report = RunReport::new(target, scheduler.last_run_id());

    record_started(&mut report, &step.newly_scheduled);
    Ok((
        report,
        CoreStep::from_parts(step.newly_scheduled, step.run_just_finished),
    ))
}

/// Handle a task completion event.
///
/// Completions carrying a run ID other than the active one are stale and
/// dropped, as are completions arriving after the run finished.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    report: &mut RunReport,
    task: TaskName,
    run_id: u64,
    outcome: TaskOutcome,
) -> CoreStep {
    if scheduler.current_run_id() != Some(run_id) {
        warn!(
            task = %task,
            run_id,
            active_run = ?scheduler.current_run_id(),
            "completion for a run that is not active; ignoring"
        );
        return CoreStep {
            commands: Vec::new(),
            keep_running: !scheduler.is_idle(),
        };
    }

    let step = scheduler.step_completion(&task, &outcome);

    match outcome {
        TaskOutcome::Success(output) => {
            report.outputs.insert(task, output);
        }
        TaskOutcome::Failed(error) => {
            if step.newly_failed.contains(&task) {
                report.failures.push(TaskFailure { task, error });
            }
        }
    }

    if !step.newly_skipped.is_empty() {
        info!(run_id, skipped = ?step.newly_skipped, "tasks skipped");
    }

    record_started(report, &step.newly_scheduled);
    CoreStep::from_parts(step.newly_scheduled, step.run_just_finished)
}

/// Handle a shutdown request: the run ends now, whatever is in flight.
pub fn handle_shutdown(scheduler: &Scheduler, report: &mut RunReport) -> CoreStep {
    if !scheduler.is_idle() {
        warn!(
            run_id = ?scheduler.current_run_id(),
            in_run = ?scheduler.tasks_in_current_run(),
            "shutdown requested with tasks outstanding"
        );
        report.interrupted = true;
    }

    CoreStep {
        commands: vec![CoreCommand::RequestExit],
        keep_running: false,
    }
}

fn record_started(report: &mut RunReport, tasks: &[ScheduledTask]) {
    report
        .started
        .extend(tasks.iter().map(|t| t.name.clone()));
}

// src/exec/task_runner.rs

//! Individual action runner.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::ActionFailure;
use crate::exec::action::{ActionContext, ActionOutput};

/// Aborts the wrapped action when the runner itself is cancelled.
struct AbortOnDrop(JoinHandle<Result<ActionOutput, ActionFailure>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Invoke a single task's action and emit exactly one `TaskCompleted` event
/// for it.
///
/// A panicking action is reported as a failure of that task.
pub async fn run_task(task: ScheduledTask, runtime_tx: mpsc::Sender<RuntimeEvent>) {
    let ctx = ActionContext {
        task: task.name.clone(),
        run_id: task.run_id,
    };

    info!(
        task = %task.name,
        run_id = task.run_id,
        action = %task.action.describe(),
        "starting task"
    );
    let started = Instant::now();

    let action = Arc::clone(&task.action);
    let mut guard = AbortOnDrop(tokio::spawn(async move { action.invoke(ctx).await }));

    let outcome = match (&mut guard.0).await {
        Ok(Ok(output)) => TaskOutcome::Success(output),
        Ok(Err(failure)) => TaskOutcome::Failed(failure),
        Err(join_err) if join_err.is_panic() => {
            error!(task = %task.name, run_id = task.run_id, "action panicked");
            TaskOutcome::Failed(ActionFailure::message("action panicked"))
        }
        Err(join_err) => TaskOutcome::Failed(ActionFailure::message(format!(
            "action was cancelled: {join_err}"
        ))),
    };

    match &outcome {
        TaskOutcome::Success(_) => info!(
            task = %task.name,
            run_id = task.run_id,
            elapsed = ?started.elapsed(),
            "task succeeded"
        ),
        TaskOutcome::Failed(failure) => warn!(
            task = %task.name,
            run_id = task.run_id,
            elapsed = ?started.elapsed(),
            error = %failure,
            "task failed"
        ),
    }

    let event = RuntimeEvent::TaskCompleted {
        task: task.name.clone(),
        run_id: task.run_id,
        outcome,
    };
    if runtime_tx.send(event).await.is_err() {
        debug!(
            task = %task.name,
            run_id = task.run_id,
            "runtime gone; dropping completion"
        );
    }
}

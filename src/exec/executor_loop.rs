// src/exec/executor_loop.rs

//! Main executor loop that manages in-flight actions.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskName};
use crate::exec::task_runner::run_task;

/// Internal handle for a currently-running action.
struct ActiveTask {
    run_id: u64,
    handle: JoinHandle<()>,
}

/// Spawn the background executor loop.
///
/// The returned `mpsc::Sender<ScheduledTask>` is what
/// `TokioExecutorBackend` forwards to. Each scheduled task is invoked in its
/// own tokio task, so independent tasks run concurrently. Within one run a
/// task name is never in flight twice.
///
/// When the sender side is dropped, every action still in flight is aborted.
pub fn spawn_executor(runtime_tx: mpsc::Sender<RuntimeEvent>) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        let mut active: HashMap<TaskName, ActiveTask> = HashMap::new();

        while let Some(task) = rx.recv().await {
            handle_scheduled_task(task, &mut active, &runtime_tx);
        }

        abort_in_flight(&mut active);
        info!("executor loop finished (channel closed)");
    });

    tx
}

/// Handle a newly scheduled task.
fn handle_scheduled_task(
    task: ScheduledTask,
    active: &mut HashMap<TaskName, ActiveTask>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    active.retain(|_, t| !t.handle.is_finished());

    if let Some(existing) = active.get(&task.name) {
        if existing.run_id == task.run_id {
            warn!(
                task = %task.name,
                run_id = task.run_id,
                "task already in flight for this run; ignoring duplicate dispatch"
            );
            return;
        }
    }

    let name = task.name.clone();
    let run_id = task.run_id;
    let rt_tx = runtime_tx.clone();
    let spawn_name = name.clone();

    let handle = tokio::spawn(async move {
        run_task(task, rt_tx).await;
        debug!(task = %spawn_name, "task runner future finished");
    });

    active.insert(name, ActiveTask { run_id, handle });
}

fn abort_in_flight(active: &mut HashMap<TaskName, ActiveTask>) {
    for (name, task) in active.drain() {
        if !task.handle.is_finished() {
            info!(task = %name, run_id = task.run_id, "aborting in-flight action");
            task.handle.abort();
        }
    }
}

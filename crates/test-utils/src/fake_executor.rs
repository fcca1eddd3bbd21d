use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use pipedag::dag::ScheduledTask;
use pipedag::engine::{RuntimeEvent, TaskOutcome};
use pipedag::errors::{ActionFailure, PipedagError, Result};
use pipedag::exec::{ActionOutput, ExecutorBackend};

/// A fake executor that:
/// - records which tasks were "run", in dispatch order
/// - never invokes the task's action
/// - immediately reports `TaskCompleted` for each scheduled task: `Failed`
///   for names in the failing set, `Success` otherwise.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failing: BTreeSet<String>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: BTreeSet::new(),
        }
    }

    /// Make the named task report a failure.
    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failing = self.failing.clone();

        Box::pin(async move {
            for t in tasks {
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push(t.name.clone());
                }

                let outcome = if failing.contains(&t.name) {
                    TaskOutcome::Failed(ActionFailure::message("fake failure"))
                } else {
                    TaskOutcome::Success(ActionOutput::empty())
                };

                tx.send(RuntimeEvent::TaskCompleted {
                    task: t.name.clone(),
                    run_id: t.run_id,
                    outcome,
                })
                .await
                .map_err(|e| PipedagError::Other(anyhow::anyhow!("runtime channel closed: {e}")))?;
            }
            Ok(())
        })
    }
}

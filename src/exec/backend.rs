// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production executor implementation in [`executor_loop`].
//!
//! - `TokioExecutorBackend` is the default implementation used by
//!   `Pipeline::run`. It wraps the `spawn_executor` loop and forwards
//!   scheduled tasks over an mpsc channel.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which tasks were scheduled and directly emits `TaskCompleted` events.
//!
//! [`executor_loop`]: super::executor_loop

use std::future::Future;
use std::pin::Pin;

use anyhow::anyhow;
use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::{PipedagError, Result};

use super::executor_loop::spawn_executor;

/// Trait abstracting how scheduled tasks are executed.
///
/// Production code uses [`TokioExecutorBackend`]; tests can provide their own
/// implementation that doesn't invoke real actions.
pub trait ExecutorBackend: Send {
    /// Dispatch the given tasks for execution.
    ///
    /// Must not wait for the tasks to finish: completions are reported as
    /// `RuntimeEvent::TaskCompleted` on the runtime channel.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Executor backend that invokes every action in its own tokio task.
///
/// Dropping the backend closes the executor loop, which aborts any action
/// still in flight.
#[derive(Debug)]
pub struct TokioExecutorBackend {
    tx: mpsc::Sender<ScheduledTask>,
}

impl TokioExecutorBackend {
    /// Create a new backend, wiring it to the given runtime event sender.
    ///
    /// This spawns the background executor loop immediately.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        let tx = spawn_executor(runtime_tx);
        Self { tx }
    }
}

impl ExecutorBackend for TokioExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for task in tasks {
                tx.send(task)
                    .await
                    .map_err(|_| PipedagError::Other(anyhow!("executor channel closed")))?;
            }
            Ok(())
        })
    }
}

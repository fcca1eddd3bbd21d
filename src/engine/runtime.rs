// src/engine/runtime.rs

use std::fmt;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::report::RunReport;
use super::{CoreCommand, CoreStep, RuntimeEvent};

/// Drives the scheduler in response to `RuntimeEvent`s, and delegates actual
/// action invocation to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
        }
    }

    /// Run `target` to completion.
    ///
    /// - Starts the run in the core (configuration errors surface here,
    ///   before anything executes).
    /// - Consumes `RuntimeEvent`s and feeds them into the core.
    /// - Executes commands returned by the core until it asks to exit.
    ///
    /// Action failures do not make this return `Err`; they are in the
    /// report. Use [`RunReport::into_result`] to fold them into an error.
    pub async fn run(mut self, target: &str) -> Result<RunReport> {
        let started = Instant::now();
        info!(goal = %target, "pipedag runtime started");

        let first = self.core.start(target)?;
        let mut keep_running = self.apply(first).await?;

        while keep_running {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    warn!("runtime event channel closed with the run still active");
                    RuntimeEvent::ShutdownRequested
                }
            };

            match &event {
                RuntimeEvent::TaskCompleted {
                    task,
                    run_id,
                    outcome,
                } => debug!(
                    task = %task,
                    run_id,
                    success = outcome.is_success(),
                    "runtime received completion"
                ),
                RuntimeEvent::ShutdownRequested => info!("shutdown requested"),
            }

            let step = self.core.step(event);
            keep_running = self.apply(step).await?;
        }

        let mut report = self.core.into_report();
        report.elapsed = started.elapsed();

        info!(
            goal = %report.target,
            run_id = report.run_id,
            success = report.is_success(),
            failed = report.failures.len(),
            skipped = report.skipped().len(),
            elapsed = ?report.elapsed,
            "runtime exiting"
        );
        Ok(report)
    }

    /// Execute the commands of one core step; returns `keep_running`.
    async fn apply(&mut self, step: CoreStep) -> Result<bool> {
        for command in step.commands {
            match command {
                CoreCommand::DispatchTasks(tasks) => self.spawn_ready(tasks).await?,
                CoreCommand::RequestExit => debug!("core issued RequestExit command"),
            }
        }
        Ok(step.keep_running)
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "spawning ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}

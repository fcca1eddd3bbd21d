// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state (scheduler + run report)
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - sending `ScheduledTask`s to the executor
//!
//! The core can be unit tested without any Tokio, channels, or processes.

use tracing::warn;

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    handle_run_start, handle_shutdown, handle_task_completion, CoreStep,
};
use crate::engine::report::RunReport;
use crate::engine::RuntimeEvent;
use crate::errors::Result;

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    report: Option<RunReport>,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            report: None,
        }
    }

    /// Expose whether the scheduler is idle (for tests).
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Report of the current (or last) run, states not yet filled in.
    pub fn report(&self) -> Option<&RunReport> {
        self.report.as_ref()
    }

    /// Start a run for `target`.
    ///
    /// Fails without touching any state if the target is unknown or its
    /// subgraph is not a DAG.
    pub fn start(&mut self, target: &str) -> Result<CoreStep> {
        let (report, step) = handle_run_start(&mut self.scheduler, target)?;
        self.report = Some(report);
        Ok(step)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        let Some(report) = self.report.as_mut() else {
            warn!(?event, "event received before any run started; ignoring");
            return CoreStep {
                commands: Vec::new(),
                keep_running: false,
            };
        };

        match event {
            RuntimeEvent::TaskCompleted {
                task,
                run_id,
                outcome,
            } => handle_task_completion(&mut self.scheduler, report, task, run_id, outcome),
            RuntimeEvent::ShutdownRequested => handle_shutdown(&self.scheduler, report),
        }
    }

    /// Finish the run and return its report with final task states.
    pub fn into_report(self) -> RunReport {
        let mut report = self.report.unwrap_or_default();
        report.states = self.scheduler.run_states().into_iter().collect();
        report
    }
}

// src/engine/mod.rs

//! Orchestration engine for a single pipeline run.
//!
//! This module ties together:
//! - the DAG scheduler (which tasks may start now)
//! - the executor backend (which actually invokes actions)
//! - the event loop that reacts to:
//!   - task completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::errors::ActionFailure;
use crate::exec::ActionOutput;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of a task action for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success(ActionOutput),
    Failed(ActionFailure),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }
}

/// Events flowing into the runtime from the executor and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task action finished with a concrete outcome.
    TaskCompleted {
        task: TaskName,
        run_id: u64,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod report;
pub mod runtime;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use report::RunReport;
pub use runtime::Runtime;

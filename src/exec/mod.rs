// src/exec/mod.rs

//! Action execution layer.
//!
//! This module defines what a task *does* and runs it, reporting back to the
//! orchestration runtime via `RuntimeEvent`s.
//!
//! - [`action`] defines the [`Action`] trait plus the no-op and closure
//!   actions.
//! - [`command`] runs external commands with `tokio::process::Command`.
//! - [`executor_loop`] owns the loop that spawns one tokio task per action.
//! - [`task_runner`] invokes a single action and reports its outcome.
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `TokioExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

pub mod action;
pub mod backend;
pub mod command;
pub mod executor_loop;
pub mod task_runner;

pub use action::{Action, ActionContext, ActionFuture, ActionOutput, FnAction, NoopAction};
pub use backend::{ExecutorBackend, TokioExecutorBackend};
pub use command::{CommandAction, Invocation};
pub use executor_loop::spawn_executor;

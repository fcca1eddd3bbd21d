// src/exec/action.rs

//! The external-action capability.
//!
//! Every task carries an [`Action`]: an opaque asynchronous operation that
//! either succeeds with an [`ActionOutput`] or fails with an
//! [`ActionFailure`]. The pipeline core never looks inside; an out-of-process
//! command ([`super::CommandAction`]) and an in-process library call
//! ([`FnAction`]) are interchangeable.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::engine::TaskName;
use crate::errors::ActionFailure;

/// Boxed future returned by [`Action::invoke`].
pub type ActionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ActionOutput, ActionFailure>> + Send + 'a>>;

/// What an action gets to know about the invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContext {
    pub task: TaskName,
    pub run_id: u64,
}

/// Result payload of a successful action.
///
/// Command actions put the captured stdout here (for example the CSS fragment
/// a critical-CSS extractor prints).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutput {
    pub stdout: Vec<u8>,
}

impl ActionOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_stdout(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
        }
    }

    /// Stdout decoded as UTF-8, replacing invalid sequences.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// An opaque unit of work attached to a task.
///
/// Implementations must be shareable across tokio tasks: the runner keeps
/// them behind an `Arc` and invokes each at most once per run.
pub trait Action: Send + Sync {
    fn invoke(&self, ctx: ActionContext) -> ActionFuture<'_>;

    /// One-line human description for listings and dry runs.
    fn describe(&self) -> String {
        "<action>".to_string()
    }
}

/// Action for tasks that only group their dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAction;

impl Action for NoopAction {
    fn invoke(&self, _ctx: ActionContext) -> ActionFuture<'_> {
        Box::pin(async { Ok(ActionOutput::empty()) })
    }

    fn describe(&self) -> String {
        "(group)".to_string()
    }
}

/// Adapter turning an async closure into an [`Action`].
///
/// ```ignore
/// let action = FnAction::new("render", |ctx| async move {
///     render_site().await.map_err(|e| ActionFailure::message(e.to_string()))?;
///     Ok(ActionOutput::empty())
/// });
/// ```
pub struct FnAction<F> {
    label: String,
    f: F,
}

impl<F, Fut> FnAction<F>
where
    F: Fn(ActionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ActionOutput, ActionFailure>> + Send + 'static,
{
    pub fn new(label: impl Into<String>, f: F) -> Self {
        Self {
            label: label.into(),
            f,
        }
    }
}

impl<F> fmt::Debug for FnAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl<F, Fut> Action for FnAction<F>
where
    F: Fn(ActionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ActionOutput, ActionFailure>> + Send + 'static,
{
    fn invoke(&self, ctx: ActionContext) -> ActionFuture<'_> {
        Box::pin((self.f)(ctx))
    }

    fn describe(&self) -> String {
        format!("fn {}", self.label)
    }
}

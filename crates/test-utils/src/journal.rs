//! Recording actions for pipeline tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pipedag::errors::ActionFailure;
use pipedag::exec::{Action, ActionContext, ActionFuture, ActionOutput};

/// Shared, ordered log of action invocations.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Action that records `name` and succeeds with `name` as its stdout.
    pub fn action(&self, name: &str) -> RecordingAction {
        RecordingAction {
            name: name.to_string(),
            journal: self.clone(),
            fail: false,
            delay: None,
        }
    }

    /// Action that records `name` and fails.
    pub fn failing_action(&self, name: &str) -> RecordingAction {
        RecordingAction {
            fail: true,
            ..self.action(name)
        }
    }

    pub fn record(&self, name: &str) {
        self.entries.lock().unwrap().push(name.to_string());
    }

    /// All invocations so far, in order.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == name)
            .count()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.lock().unwrap().iter().position(|e| e == name)
    }
}

/// Action built by [`Journal`].
#[derive(Debug, Clone)]
pub struct RecordingAction {
    name: String,
    journal: Journal,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingAction {
    /// Sleep for `delay` after recording, before completing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Action for RecordingAction {
    fn invoke(&self, _ctx: ActionContext) -> ActionFuture<'_> {
        Box::pin(async move {
            self.journal.record(&self.name);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                Err(ActionFailure::message(format!("{} failed", self.name)))
            } else {
                Ok(ActionOutput::from_stdout(self.name.clone()))
            }
        })
    }

    fn describe(&self) -> String {
        format!("record {}", self.name)
    }
}

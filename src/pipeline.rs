// src/pipeline.rs

//! The explicit pipeline value: registered tasks plus their dependency
//! graph.
//!
//! A [`Pipeline`] is built once (by hand or from a config file) and can be
//! run any number of times. Every run gets a fresh per-run state table, so
//! nothing carries over between runs.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::model::ConfigFile;
use crate::dag::{DagGraph, Scheduler};
use crate::engine::{CoreRuntime, RunReport, Runtime, RuntimeEvent, TaskName};
use crate::errors::{PipedagError, Result};
use crate::exec::{Action, CommandAction, NoopAction, TokioExecutorBackend};
use crate::types::FailurePolicy;

/// A registered task.
#[derive(Clone)]
pub struct Task {
    id: TaskName,
    dependencies: Vec<TaskName>,
    action: Arc<dyn Action>,
}

impl Task {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dependencies(&self) -> &[TaskName] {
        &self.dependencies
    }

    pub fn action(&self) -> Arc<dyn Action> {
        Arc::clone(&self.action)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .field("action", &self.action.describe())
            .finish()
    }
}

/// Per-run knobs for [`Pipeline::run_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Overrides the pipeline's failure policy for this run.
    pub failure_policy: Option<FailurePolicy>,
    /// Turn Ctrl-C into an interrupted run.
    pub handle_ctrl_c: bool,
}

#[derive(Debug, Default)]
pub struct Pipeline {
    tasks: BTreeMap<TaskName, Task>,
    graph: DagGraph,
    failure_policy: FailurePolicy,
    /// Last run id handed out; run ids are unique per pipeline.
    run_counter: AtomicU64,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn set_failure_policy(&mut self, policy: FailurePolicy) {
        self.failure_policy = policy;
    }

    /// Register a task whose dependencies are all registered already.
    ///
    /// On error the pipeline is unchanged.
    pub fn register<I, S>(
        &mut self,
        id: impl Into<TaskName>,
        dependencies: I,
        action: impl Action + 'static,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        let id = id.into();
        let dependencies: Vec<TaskName> = dependencies.into_iter().map(Into::into).collect();

        self.ensure_new(&id)?;
        if let Some(missing) = dependencies.iter().find(|d| !self.tasks.contains_key(*d)) {
            return Err(PipedagError::UnknownDependency {
                task: id,
                dependency: missing.clone(),
            });
        }

        self.insert(id, dependencies, Arc::new(action));
        Ok(())
    }

    /// Register a task whose dependencies may be declared later.
    ///
    /// Dangling dependencies are reported by [`Pipeline::validate`] or when
    /// a run needs them.
    pub fn declare<I, S>(
        &mut self,
        id: impl Into<TaskName>,
        dependencies: I,
        action: impl Action + 'static,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        self.declare_shared(id, dependencies, Arc::new(action))
    }

    /// [`Pipeline::declare`] for an action that is already shared.
    pub fn declare_shared<I, S>(
        &mut self,
        id: impl Into<TaskName>,
        dependencies: I,
        action: Arc<dyn Action>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        let id = id.into();
        self.ensure_new(&id)?;
        self.insert(
            id,
            dependencies.into_iter().map(Into::into).collect(),
            action,
        );
        Ok(())
    }

    /// Check every dependency exists and the whole graph is acyclic.
    pub fn validate(&self) -> Result<()> {
        self.graph.check()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// All tasks, sorted by id.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Execution order for `target`: its transitive dependencies first,
    /// `target` last.
    pub fn plan(&self, target: &str) -> Result<Vec<TaskName>> {
        self.graph.topological_order(target)
    }

    /// Run `target` and everything it depends on.
    pub async fn run(&self, target: &str) -> Result<RunReport> {
        self.run_with(target, RunOptions::default()).await
    }

    /// Run `target` with explicit options; action failures become
    /// `PipedagError::Pipeline`.
    pub async fn run_with(&self, target: &str, options: RunOptions) -> Result<RunReport> {
        self.run_report(target, options).await?.into_result()
    }

    /// Run `target` and return the report even when actions failed.
    ///
    /// Only configuration errors (unknown target, dangling dependency,
    /// cycle) are returned as `Err`, and those before anything executes.
    pub async fn run_report(&self, target: &str, options: RunOptions) -> Result<RunReport> {
        let plan = self.plan(target)?;
        debug!(goal = %target, ?plan, "planned run");

        let policy = options.failure_policy.unwrap_or(self.failure_policy);
        let last_run_id = self.run_counter.fetch_add(1, Ordering::Relaxed);
        let scheduler = Scheduler::from_pipeline(self)
            .with_failure_policy(policy)
            .with_run_counter(last_run_id);

        let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
        let executor = TokioExecutorBackend::new(rt_tx.clone());
        let ctrl_c = options.handle_ctrl_c.then(|| spawn_ctrl_c_listener(rt_tx.clone()));
        drop(rt_tx);

        let runtime = Runtime::new(CoreRuntime::new(scheduler), rt_rx, executor);
        let result = runtime.run(target).await;

        if let Some(handle) = ctrl_c {
            handle.abort();
        }
        result
    }

    /// Build a pipeline from a validated config file.
    ///
    /// Tasks without `cmd` or `program` group their dependencies and do
    /// nothing themselves.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut pipeline = Pipeline::new().with_failure_policy(cfg.config.on_failure);

        for (name, task) in &cfg.task {
            let action: Arc<dyn Action> = match CommandAction::from_task_config(name, task, cfg)? {
                Some(cmd) => Arc::new(cmd),
                None => Arc::new(NoopAction),
            };
            pipeline.declare_shared(name.clone(), task.after.iter().cloned(), action)?;
        }

        pipeline.validate()?;
        info!(
            tasks = pipeline.len(),
            on_failure = ?pipeline.failure_policy,
            "pipeline built from config"
        );
        Ok(pipeline)
    }

    fn ensure_new(&self, id: &str) -> Result<()> {
        if self.tasks.contains_key(id) {
            return Err(PipedagError::DuplicateTask(id.to_string()));
        }
        Ok(())
    }

    fn insert(&mut self, id: TaskName, dependencies: Vec<TaskName>, action: Arc<dyn Action>) {
        debug!(task = %id, deps = ?dependencies, action = %action.describe(), "task registered");
        self.graph.add_task(&id, &dependencies);
        self.tasks.insert(
            id.clone(),
            Task {
                id,
                dependencies,
                action,
            },
        );
    }
}

fn spawn_ctrl_c_listener(tx: mpsc::Sender<RuntimeEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            return;
        }
        let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
    })
}

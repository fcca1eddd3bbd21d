// src/exec/command.rs

//! External command actions.
//!
//! A [`CommandAction`] runs either a shell line or a program with an explicit
//! argument vector, using `tokio::process::Command`. Stdout is captured and
//! handed back as the action output; stderr is logged at debug level and its
//! last lines are kept for the failure report.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::model::{ConfigFile, TaskConfig};
use crate::errors::{ActionFailure, PipedagError, Result};
use crate::exec::action::{Action, ActionContext, ActionFuture, ActionOutput};
use crate::types::parse_duration;

/// Number of trailing stderr lines kept for `ActionFailure::ExitStatus`.
pub const STDERR_TAIL_LINES: usize = 20;

/// How the process is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// A command line handed to the platform shell.
    Shell(String),
    /// A program started directly with the given arguments.
    Program { program: String, args: Vec<String> },
}

/// An action that runs an external command.
#[derive(Debug, Clone)]
pub struct CommandAction {
    invocation: Invocation,
    cwd: Option<PathBuf>,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
    stdout_to: Option<PathBuf>,
}

impl CommandAction {
    pub fn shell(cmd: impl Into<String>) -> Self {
        Self::with_invocation(Invocation::Shell(cmd.into()))
    }

    pub fn program<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_invocation(Invocation::Program {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        })
    }

    fn with_invocation(invocation: Invocation) -> Self {
        Self {
            invocation,
            cwd: None,
            env: BTreeMap::new(),
            timeout: None,
            stdout_to: None,
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Write captured stdout to `path` after a successful run.
    ///
    /// Relative paths are resolved against the working directory.
    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_to = Some(path.into());
        self
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn timeout_limit(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn working_dir(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Build the action for a configured task.
    ///
    /// Returns `Ok(None)` for group tasks (no `cmd` and no `program`).
    pub fn from_task_config(
        name: &str,
        task: &TaskConfig,
        cfg: &ConfigFile,
    ) -> Result<Option<Self>> {
        let invocation = match (&task.cmd, &task.program) {
            (Some(cmd), None) => Invocation::Shell(cmd.clone()),
            (None, Some(program)) => Invocation::Program {
                program: program.clone(),
                args: task.program_args().map_err(|e| {
                    PipedagError::ConfigError(format!("task '{}': {}", name, e))
                })?,
            },
            (None, None) => return Ok(None),
            (Some(_), Some(_)) => {
                return Err(PipedagError::ConfigError(format!(
                    "task '{}' sets both `cmd` and `program`",
                    name
                )));
            }
        };

        let cwd = match task.cwd.as_ref().or(cfg.default.cwd.as_ref()) {
            Some(dir) => cfg.resolve_path(dir),
            None => cfg.base_dir.clone(),
        };

        let mut env = cfg.default.env.clone();
        env.extend(task.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        let timeout = task
            .timeout
            .as_ref()
            .or(cfg.default.timeout.as_ref())
            .map(|s| parse_duration(s))
            .transpose()
            .map_err(|e| PipedagError::ConfigError(format!("task '{}': {}", name, e)))?;

        Ok(Some(Self {
            invocation,
            stdout_to: task.stdout_to.as_ref().map(|p| cwd.join(p)),
            cwd: Some(cwd),
            env,
            timeout,
        }))
    }

    fn program_name(&self) -> String {
        match &self.invocation {
            Invocation::Shell(cmd) => cmd.clone(),
            Invocation::Program { program, .. } => program.clone(),
        }
    }

    fn build_command(&self) -> Command {
        let mut cmd = match &self.invocation {
            // Build a shell command appropriate for the platform.
            Invocation::Shell(line) if cfg!(windows) => {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(line);
                c
            }
            Invocation::Shell(line) => {
                let mut c = Command::new("sh");
                c.arg("-c").arg(line);
                c
            }
            Invocation::Program { program, args } => {
                let mut c = Command::new(program);
                c.args(args);
                c
            }
        };

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(&self.env);

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn execute(&self, ctx: ActionContext) -> std::result::Result<ActionOutput, ActionFailure> {
        info!(
            task = %ctx.task,
            run_id = ctx.run_id,
            cmd = %self.describe(),
            "starting task process"
        );

        let mut child = self.build_command().spawn().map_err(|e| ActionFailure::Spawn {
            program: self.program_name(),
            message: e.to_string(),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let mut stdout_reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut out) = stdout {
                if let Err(e) = out.read_to_end(&mut buf).await {
                    debug!(error = %e, "stdout read ended with error");
                }
            }
            buf
        });

        // Always consume stderr so buffers don't fill; log at debug.
        let task_name = ctx.task.clone();
        let run_id = ctx.run_id;
        let mut stderr_reader = tokio::spawn(async move {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(err) = stderr {
                let mut lines = BufReader::new(err).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %task_name, run_id, "stderr: {}", line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail.into_iter().collect::<Vec<_>>()
        });

        // The deadline covers the pipe drains too: a background process can
        // keep stdout open long after the direct child exited.
        let finished = async {
            let status = child.wait().await;
            let stdout = (&mut stdout_reader).await.unwrap_or_default();
            let stderr_tail = (&mut stderr_reader).await.unwrap_or_default();
            (status, stdout, stderr_tail)
        };

        let (waited, stdout, stderr_tail) = match self.timeout {
            Some(limit) => {
                let outcome = tokio::time::timeout(limit, finished).await;
                match outcome {
                    Ok(done) => done,
                    Err(_elapsed) => {
                        warn!(
                            task = %ctx.task,
                            run_id = ctx.run_id,
                            timeout = ?limit,
                            "task exceeded its timeout; killing process"
                        );
                        if let Ok(None) = child.try_wait() {
                            if let Err(e) = child.kill().await {
                                warn!(task = %ctx.task, error = %e, "failed to kill timed out process");
                            }
                        }
                        stdout_reader.abort();
                        stderr_reader.abort();
                        return Err(ActionFailure::TimedOut(limit));
                    }
                }
            }
            None => finished.await,
        };

        let status = waited.map_err(|e| {
            ActionFailure::message(format!("waiting for process of task '{}': {}", ctx.task, e))
        })?;

        let code = status.code().unwrap_or(-1);

        info!(
            task = %ctx.task,
            run_id = ctx.run_id,
            exit_code = code,
            success = status.success(),
            stdout_bytes = stdout.len(),
            "task process exited"
        );

        if !status.success() {
            return Err(ActionFailure::ExitStatus { code, stderr_tail });
        }

        if let Some(path) = &self.stdout_to {
            write_output(path, &stdout).await?;
            debug!(task = %ctx.task, path = ?path, "wrote captured stdout");
        }

        Ok(ActionOutput { stdout })
    }
}

async fn write_output(path: &PathBuf, bytes: &[u8]) -> std::result::Result<(), ActionFailure> {
    let fail = |e: std::io::Error| ActionFailure::Output {
        path: path.clone(),
        message: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(fail)?;
        }
    }
    tokio::fs::write(path, bytes).await.map_err(fail)
}

impl Action for CommandAction {
    fn invoke(&self, ctx: ActionContext) -> ActionFuture<'_> {
        Box::pin(self.execute(ctx))
    }

    fn describe(&self) -> String {
        match &self.invocation {
            Invocation::Shell(cmd) => cmd.clone(),
            Invocation::Program { program, args } if args.is_empty() => program.clone(),
            Invocation::Program { program, args } => format!("{} {}", program, args.join(" ")),
        }
    }
}

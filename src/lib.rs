// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod pipeline;
pub mod types;

use std::path::PathBuf;

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::RunReport;
use crate::errors::{PipedagError, Result};
use crate::types::FailurePolicy;

pub use crate::engine::TaskName;
pub use crate::errors::{ActionFailure, PipelineError, TaskFailure};
pub use crate::exec::{Action, ActionContext, ActionOutput, CommandAction, FnAction, NoopAction};
pub use crate::pipeline::{Pipeline, RunOptions, Task};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and pipeline construction
/// - `--list` / `--dry-run` output
/// - the run itself, with Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let mut pipeline = Pipeline::from_config(&cfg)?;

    if args.fail_fast {
        pipeline.set_failure_policy(FailurePolicy::FailFast);
    }

    if args.list {
        print_task_list(&cfg, &pipeline);
        return Ok(());
    }

    let target = resolve_target(&args, &cfg)?;

    if args.dry_run {
        print_dry_run(&pipeline, &target)?;
        return Ok(());
    }

    info!(goal = %target, config = %config_path.display(), "running pipeline");

    let options = RunOptions {
        failure_policy: None,
        handle_ctrl_c: true,
    };
    let report = pipeline.run_report(&target, options).await?;
    print_summary(&report);

    report.into_result().map(|_| ())
}

/// CLI target, falling back to `[config].default_target`.
fn resolve_target(args: &CliArgs, cfg: &ConfigFile) -> Result<String> {
    args.task
        .clone()
        .or_else(|| cfg.config.default_target.clone())
        .ok_or_else(|| {
            PipedagError::ConfigError(
                "no task given and no `default_target` in [config]".to_string(),
            )
        })
}

fn print_task_list(cfg: &ConfigFile, pipeline: &Pipeline) {
    println!("tasks ({}):", pipeline.len());
    for task in pipeline.tasks() {
        println!("  - {}", task.id());
        println!("      action: {}", task.action().describe());
        if !task.dependencies().is_empty() {
            println!("      after: {:?}", task.dependencies());
        }
        if let Some(desc) = cfg
            .task
            .get(task.id())
            .and_then(|t| t.description.as_deref())
        {
            println!("      description: {desc}");
        }
    }
}

/// Print the execution order for `target` without running anything.
fn print_dry_run(pipeline: &Pipeline, target: &str) -> Result<()> {
    let plan = pipeline.plan(target)?;

    println!("pipedag dry-run: {target}");
    println!("  on_failure = {:?}", pipeline.failure_policy());
    println!();

    for (i, name) in plan.iter().enumerate() {
        let Some(task) = pipeline.task(name) else {
            continue;
        };
        println!("  {}. {}", i + 1, name);
        println!("      action: {}", task.action().describe());
        if !task.dependencies().is_empty() {
            println!("      after: {:?}", task.dependencies());
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_summary(report: &RunReport) {
    let outcome = if report.is_success() { "ok" } else { "FAILED" };
    println!(
        "pipedag: {} {} in {:.2?}",
        report.target, outcome, report.elapsed
    );

    for (name, state) in &report.states {
        println!("  {name}: {state}");
    }
    for failure in &report.failures {
        println!("  error: {failure}");
    }
}

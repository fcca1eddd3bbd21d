// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::config::loader::DEFAULT_CONFIG_FILE;

/// Command-line arguments for `pipedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pipedag",
    version,
    about = "Run a named build target and, first, everything it depends on.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run. Falls back to `[config].default_target`.
    #[arg(value_name = "TASK")]
    pub task: Option<String>,

    /// Path to the pipeline file (TOML).
    ///
    /// Default: `Pipedag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Stop starting new tasks after the first failure.
    ///
    /// Overrides `[config].on_failure`.
    #[arg(long)]
    pub fail_fast: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIPEDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate and print the execution plan, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print every declared task and exit.
    #[arg(long, conflicts_with = "dry_run")]
    pub list: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

// tests/cli_and_logging.rs

use clap::Parser;

use pipedag::cli::{CliArgs, LogLevel};
use pipedag::logging::resolve_level;

#[test]
fn cli_flag_wins_over_env() {
    assert_eq!(
        resolve_level(Some(LogLevel::Warn), Some("trace")),
        tracing::Level::WARN
    );
}

#[test]
fn env_value_used_when_no_flag() {
    assert_eq!(resolve_level(None, Some(" Debug ")), tracing::Level::DEBUG);
    assert_eq!(resolve_level(None, Some("warning")), tracing::Level::WARN);
}

#[test]
fn falls_back_to_info() {
    assert_eq!(resolve_level(None, None), tracing::Level::INFO);
    assert_eq!(resolve_level(None, Some("loud")), tracing::Level::INFO);
}

#[test]
fn cli_defaults() {
    let args = CliArgs::parse_from(["pipedag"]);
    assert_eq!(args.task, None);
    assert_eq!(args.config, "Pipedag.toml");
    assert_eq!(args.config, pipedag::config::loader::DEFAULT_CONFIG_FILE);
    assert!(!args.fail_fast && !args.dry_run && !args.list);
    assert!(args.log_level.is_none());
}

#[test]
fn cli_target_and_flags() {
    let args = CliArgs::parse_from([
        "pipedag",
        "--config",
        "site/Pipedag.toml",
        "--fail-fast",
        "--log-level",
        "debug",
        "deploy",
    ]);
    assert_eq!(args.task.as_deref(), Some("deploy"));
    assert_eq!(args.config, "site/Pipedag.toml");
    assert!(args.fail_fast);
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
}

#[test]
fn list_conflicts_with_dry_run() {
    assert!(CliArgs::try_parse_from(["pipedag", "--list", "--dry-run"]).is_err());
}

// tests/config_loading.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};
use crate::common::TestResult;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;

use pipedag::config::{load_and_validate, load_from_str, render_options};
use pipedag::errors::PipedagError;
use pipedag::exec::{CommandAction, Invocation};
use pipedag::types::FailurePolicy;
use pipedag::Pipeline;

fn demo_config_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/Pipedag.toml")
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn demo_config_builds_the_site_pipeline() -> TestResult {
    let path = demo_config_path();
    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.config.default_target.as_deref(), Some("deploy"));
    assert_eq!(cfg.config.on_failure, FailurePolicy::Continue);
    assert_eq!(cfg.base_dir, path.parent().unwrap());

    let pipeline = Pipeline::from_config(&cfg)?;
    assert_eq!(
        pipeline.plan("deploy")?,
        vec!["build", "uncss", "critical", "assets", "deploy"]
    );
    assert_eq!(pipeline.task("assets").unwrap().action().describe(), "(group)");
    Ok(())
}

#[test]
fn demo_program_tasks_render_options_after_args() -> TestResult {
    let cfg = load_and_validate(demo_config_path())?;
    let critical = CommandAction::from_task_config("critical", &cfg.task["critical"], &cfg)?
        .expect("critical has a program");

    match critical.invocation() {
        Invocation::Program { program, args } => {
            assert_eq!(program, "critical");
            assert_eq!(
                args,
                &vec![
                    "dist/index.html",
                    "--base",
                    "dist",
                    "--height",
                    "900",
                    "--inline",
                    "--timeout",
                    "30000",
                    "--width",
                    "1300",
                ]
            );
        }
        other => panic!("expected a program invocation, got {other:?}"),
    }
    assert_eq!(critical.timeout_limit(), Some(Duration::from_secs(120)));
    assert_eq!(
        critical.environment().get("JEKYLL_ENV").map(String::as_str),
        Some("production")
    );
    Ok(())
}

#[test]
fn default_timeout_applies_when_task_has_none() -> TestResult {
    let cfg = load_and_validate(demo_config_path())?;
    let build = CommandAction::from_task_config("build", &cfg.task["build"], &cfg)?.unwrap();

    assert_eq!(build.timeout_limit(), Some(Duration::from_secs(600)));
    assert_eq!(
        build.invocation(),
        &Invocation::Shell("jekyll build -d dist".to_string())
    );
    assert_eq!(build.working_dir(), Some(&cfg.base_dir));
    Ok(())
}

#[test]
fn option_rendering_rules() {
    let mut options = BTreeMap::new();
    options.insert("ignore".to_string(), toml::Value::from(vec!["code", "pre"]));
    options.insert("minify".to_string(), toml::Value::Boolean(true));
    options.insert("verbose".to_string(), toml::Value::Boolean(false));
    options.insert("width".to_string(), toml::Value::Integer(1300));

    assert_eq!(
        render_options(&options).unwrap(),
        vec!["--ignore", "code", "--ignore", "pre", "--minify", "--width", "1300"]
    );
}

#[test]
fn table_option_values_are_rejected() {
    let raw = load_from_str(
        r#"
[task.css]
program = "uncss"
options = { nested = { a = 1 } }
"#,
    )
    .unwrap();

    let err = pipedag::config::ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, PipedagError::ConfigError(ref msg) if msg.contains("nested")));
}

#[test]
fn cycle_in_config_becomes_cyclic_dependency() {
    let file = write_config(
        r#"
[task.A]
cmd = "echo A"
after = ["B"]

[task.B]
cmd = "echo B"
after = ["A"]
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    match Pipeline::from_config(&cfg) {
        Err(PipedagError::CyclicDependency(names)) => assert_eq!(names, vec!["A", "B"]),
        other => panic!("expected CyclicDependency, got {other:?}"),
    }
}

#[test]
fn unknown_dependency_in_config_is_reported() {
    let file = write_config(
        r#"
[task.A]
cmd = "echo A"
after = ["NonExistent"]
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    match Pipeline::from_config(&cfg) {
        Err(PipedagError::UnknownDependency { task, dependency }) => {
            assert_eq!(task, "A");
            assert_eq!(dependency, "NonExistent");
        }
        other => panic!("expected UnknownDependency, got {other:?}"),
    }
}

#[test]
fn invalid_toml_is_a_toml_error() {
    let file = write_config("[task.A\ncmd = ");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(PipedagError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        load_and_validate("/definitely/not/here/Pipedag.toml"),
        Err(PipedagError::IoError(_))
    ));
}

#[test]
fn unknown_task_field_is_rejected() {
    let file = write_config(
        r#"
[task.A]
cmd = "echo A"
watch = ["src/**"]
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(PipedagError::TomlError(_))
    ));
}

#[test]
fn shape_errors_are_config_errors() {
    let cases = [
        ConfigFileBuilder::new(),
        ConfigFileBuilder::new().with_task(
            "both",
            TaskConfigBuilder::shell("echo").build(),
        )
        .default_target("missing"),
        ConfigFileBuilder::new().with_task(
            "args",
            TaskConfigBuilder::shell("echo").arg("x").build(),
        ),
        ConfigFileBuilder::new().with_task(
            "group",
            TaskConfigBuilder::group().stdout_to("out.txt").build(),
        ),
        ConfigFileBuilder::new().with_task(
            "slow",
            TaskConfigBuilder::shell("sleep 1").timeout("soon").build(),
        ),
        ConfigFileBuilder::new().with_task(
            "self",
            TaskConfigBuilder::shell("echo").after("self").build(),
        ),
        ConfigFileBuilder::new()
            .with_task("a", TaskConfigBuilder::shell("echo").build())
            .with_default_timeout("10 minutes"),
    ];

    for builder in cases {
        match builder.try_build() {
            Err(PipedagError::ConfigError(_)) => {}
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }
}

#[test]
fn cmd_and_program_are_exclusive() {
    let file = write_config(
        r#"
[task.A]
cmd = "echo A"
program = "echo"
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(PipedagError::ConfigError(ref msg)) if msg.contains("both")
    ));
}

#[test]
fn on_failure_parses_kebab_case() -> TestResult {
    let raw = load_from_str(
        r#"
[config]
on_failure = "fail-fast"

[task.A]
cmd = "echo A"
"#,
    )?;
    assert_eq!(raw.config.on_failure, FailurePolicy::FailFast);
    Ok(())
}

#[test]
fn task_cwd_and_stdout_to_resolve_against_base_dir() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "css",
            TaskConfigBuilder::program("uncss")
                .cwd("site")
                .stdout_to("out/main.css")
                .build(),
        )
        .build_in(Path::new("/project"));

    let action = CommandAction::from_task_config("css", &cfg.task["css"], &cfg)?.unwrap();
    assert_eq!(action.working_dir(), Some(&PathBuf::from("/project/site")));
    Ok(())
}

#[test]
fn parse_duration_units() {
    use pipedag::types::parse_duration;

    assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
    assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
    assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("5d").is_err());
}

#[test]
fn oversized_timeout_is_a_config_error() -> TestResult {
    use pipedag::config::ConfigFile;
    use pipedag::types::parse_duration;

    assert!(parse_duration("9999999999999999h").is_err());
    assert!(parse_duration("999999999999999999m").is_err());

    let raw = load_from_str("[task.a]\ncmd = \"true\"\ntimeout = \"9999999999999999h\"\n")?;
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, PipedagError::ConfigError(msg) if msg.contains("too large")));
    Ok(())
}

#[test]
fn demo_uncss_rewrites_the_stylesheet_it_reads() -> TestResult {
    let cfg = load_and_validate(demo_config_path())?;
    let uncss = CommandAction::from_task_config("uncss", &cfg.task["uncss"], &cfg)?
        .expect("uncss has a command");

    match uncss.invocation() {
        Invocation::Shell(line) => {
            assert!(line.contains("$(find dist -name '*.html')"));
            assert!(line.contains("assets/main.css"));
        }
        other => panic!("expected a shell invocation, got {other:?}"),
    }
    assert_eq!(
        cfg.task["uncss"].stdout_to.as_deref(),
        Some("dist/assets/main.css")
    );
    Ok(())
}

// tests/pipeline_register.rs

mod common;
use crate::common::{init_tracing, with_timeout, Journal, TestResult};

use pipedag::errors::PipedagError;
use pipedag::exec::NoopAction;
use pipedag::Pipeline;

#[test]
fn duplicate_registration_fails_and_keeps_first() {
    init_tracing();
    let journal = Journal::new();
    let mut pipeline = Pipeline::new();

    pipeline
        .register("build", Vec::<String>::new(), journal.action("first"))
        .unwrap();
    let err = pipeline
        .register("build", Vec::<String>::new(), journal.action("second"))
        .unwrap_err();

    match err {
        PipedagError::DuplicateTask(name) => assert_eq!(name, "build"),
        other => panic!("expected DuplicateTask, got {other:?}"),
    }

    assert_eq!(pipeline.len(), 1);
    let task = pipeline.task("build").expect("first registration kept");
    assert_eq!(task.action().describe(), "record first");
}

#[tokio::test]
async fn first_registration_is_the_one_that_runs() -> TestResult {
    init_tracing();
    let journal = Journal::new();
    let mut pipeline = Pipeline::new();

    pipeline.register("build", Vec::<String>::new(), journal.action("first"))?;
    assert!(pipeline
        .register("build", Vec::<String>::new(), journal.action("second"))
        .is_err());

    with_timeout(pipeline.run("build")).await?;

    assert_eq!(journal.entries(), vec!["first".to_string()]);
    Ok(())
}

#[test]
fn register_rejects_unknown_dependency() {
    let mut pipeline = Pipeline::new();

    let err = pipeline
        .register("deploy", ["build"], NoopAction)
        .unwrap_err();

    match err {
        PipedagError::UnknownDependency { task, dependency } => {
            assert_eq!(task, "deploy");
            assert_eq!(dependency, "build");
        }
        other => panic!("expected UnknownDependency, got {other:?}"),
    }
    assert!(!pipeline.contains("deploy"), "failed registration must not be kept");
}

#[test]
fn register_accepts_dependencies_declared_earlier() -> TestResult {
    let mut pipeline = Pipeline::new();
    pipeline.register("build", Vec::<String>::new(), NoopAction)?;
    pipeline.register("uncss", ["build"], NoopAction)?;
    pipeline.register("deploy", ["uncss"], NoopAction)?;

    assert_eq!(pipeline.plan("deploy")?, vec!["build", "uncss", "deploy"]);
    Ok(())
}

#[test]
fn declare_allows_any_order_and_validate_catches_dangling_ids() -> TestResult {
    let mut pipeline = Pipeline::new();
    pipeline.declare("deploy", ["uncss"], NoopAction)?;
    pipeline.declare("uncss", ["build"], NoopAction)?;

    match pipeline.validate() {
        Err(PipedagError::UnknownDependency { task, dependency }) => {
            assert_eq!(task, "uncss");
            assert_eq!(dependency, "build");
        }
        other => panic!("expected UnknownDependency, got {other:?}"),
    }

    pipeline.declare("build", Vec::<String>::new(), NoopAction)?;
    pipeline.validate()?;
    assert_eq!(pipeline.plan("deploy")?, vec!["build", "uncss", "deploy"]);
    Ok(())
}

#[test]
fn declare_still_rejects_duplicates() -> TestResult {
    let mut pipeline = Pipeline::new();
    pipeline.declare("build", Vec::<String>::new(), NoopAction)?;

    assert!(matches!(
        pipeline.declare("build", ["x"], NoopAction),
        Err(PipedagError::DuplicateTask(_))
    ));
    assert!(pipeline.task("build").unwrap().dependencies().is_empty());
    Ok(())
}

#[test]
fn plan_of_unknown_target_fails() {
    let pipeline = Pipeline::new();
    assert!(matches!(
        pipeline.plan("nope"),
        Err(PipedagError::UnknownTask(name)) if name == "nope"
    ));
}

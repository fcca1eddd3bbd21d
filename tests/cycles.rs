// tests/cycles.rs

mod common;
use crate::common::{init_tracing, with_timeout, Journal, TestResult};

use pipedag::errors::PipedagError;
use pipedag::Pipeline;

#[tokio::test]
async fn cycle_reachable_from_target_fails_before_any_action() -> TestResult {
    init_tracing();
    let journal = Journal::new();
    let mut p = Pipeline::new();
    p.declare("root", Vec::<String>::new(), journal.action("root"))?;
    p.declare("a", ["root", "c"], journal.action("a"))?;
    p.declare("b", ["a"], journal.action("b"))?;
    p.declare("c", ["b"], journal.action("c"))?;
    p.declare("top", ["c"], journal.action("top"))?;

    let err = with_timeout(p.run("top")).await.unwrap_err();

    match err {
        PipedagError::CyclicDependency(names) => assert_eq!(names, vec!["a", "b", "c"]),
        other => panic!("expected CyclicDependency, got {other:?}"),
    }
    assert!(journal.entries().is_empty(), "no action may run: {:?}", journal.entries());
    Ok(())
}

#[tokio::test]
async fn cycle_outside_target_closure_does_not_block_run() -> TestResult {
    init_tracing();
    let journal = Journal::new();
    let mut p = Pipeline::new();
    p.declare("ok", Vec::<String>::new(), journal.action("ok"))?;
    p.declare("x", ["y"], journal.action("x"))?;
    p.declare("y", ["x"], journal.action("y"))?;

    with_timeout(p.run("ok")).await?;
    assert_eq!(journal.entries(), vec!["ok".to_string()]);

    // The whole-graph check still reports it.
    assert!(matches!(
        p.validate(),
        Err(PipedagError::CyclicDependency(names)) if names == vec!["x", "y"]
    ));
    Ok(())
}

#[test]
fn two_task_cycle_is_named_in_error_message() -> TestResult {
    let mut p = Pipeline::new();
    p.declare("A", ["B"], pipedag::NoopAction)?;
    p.declare("B", ["A"], pipedag::NoopAction)?;

    let err = p.plan("A").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cyclic dependency between tasks: A, B"
    );
    Ok(())
}

#[tokio::test]
async fn unknown_dependency_in_closure_fails_before_any_action() -> TestResult {
    init_tracing();
    let journal = Journal::new();
    let mut p = Pipeline::new();
    p.declare("build", Vec::<String>::new(), journal.action("build"))?;
    p.declare("deploy", ["build", "missing"], journal.action("deploy"))?;

    let err = with_timeout(p.run("deploy")).await.unwrap_err();

    assert!(matches!(
        err,
        PipedagError::UnknownDependency { ref task, ref dependency }
            if task == "deploy" && dependency == "missing"
    ));
    assert!(journal.entries().is_empty());
    Ok(())
}

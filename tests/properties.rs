// tests/properties.rs

mod common;
use crate::common::Journal;

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use pipedag::dag::{Scheduler, TaskRunState};
use pipedag::engine::TaskOutcome;
use pipedag::errors::ActionFailure;
use pipedag::exec::{ActionOutput, NoopAction};
use pipedag::Pipeline;

/// Dependency lists for a random DAG.
///
/// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let deps: BTreeSet<usize> = if i == 0 {
                        BTreeSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    };
                    deps.into_iter().collect()
                })
                .collect()
        })
    })
}

fn task_name(i: usize) -> String {
    format!("task_{i}")
}

/// `target` plus everything upstream of it.
fn closure(deps: &[Vec<usize>], target: usize) -> BTreeSet<usize> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![target];
    while let Some(i) = stack.pop() {
        if seen.insert(i) {
            stack.extend(deps[i].iter().copied());
        }
    }
    seen
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn run_invokes_exactly_the_closure_once_in_dependency_order(
        deps in dag_strategy(10),
        target_seed in any::<usize>(),
    ) {
        let target = target_seed % deps.len();
        let journal = Journal::new();
        let mut pipeline = Pipeline::new();
        for (i, d) in deps.iter().enumerate() {
            pipeline
                .register(task_name(i), d.iter().map(|&j| task_name(j)), journal.action(&task_name(i)))
                .unwrap();
        }

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let report = rt.block_on(pipeline.run(&task_name(target))).unwrap();

        let expected: BTreeSet<String> = closure(&deps, target).into_iter().map(task_name).collect();
        let entries = journal.entries();
        let invoked: BTreeSet<String> = entries.iter().cloned().collect();

        prop_assert_eq!(entries.len(), invoked.len(), "a task ran twice: {:?}", entries);
        prop_assert_eq!(&invoked, &expected);
        prop_assert_eq!(report.states.len(), expected.len());

        for (i, d) in deps.iter().enumerate() {
            let Some(pos) = journal.position(&task_name(i)) else { continue };
            for &j in d {
                let dep_pos = journal.position(&task_name(j));
                prop_assert!(dep_pos.is_some_and(|p| p < pos), "{} ran before its dependency {}", i, j);
            }
        }
    }

    #[test]
    fn scheduler_terminates_and_never_starts_downstream_of_failure(
        deps in dag_strategy(10),
        failing in proptest::collection::vec(any::<usize>(), 0..4),
    ) {
        let failing: HashSet<String> = failing.iter().map(|i| task_name(i % deps.len())).collect();
        let mut pipeline = Pipeline::new();
        for (i, d) in deps.iter().enumerate() {
            pipeline.register(task_name(i), d.iter().map(|&j| task_name(j)), NoopAction).unwrap();
        }
        // A sink over every task so the whole graph is in the run.
        let all: Vec<String> = (0..deps.len()).map(task_name).collect();
        pipeline.register("sink", all, NoopAction).unwrap();

        let mut scheduler = Scheduler::from_pipeline(&pipeline);
        let mut queue: Vec<String> = scheduler
            .step_start("sink")
            .unwrap()
            .newly_scheduled
            .into_iter()
            .map(|t| t.name)
            .collect();
        let mut started: Vec<String> = queue.clone();

        let mut steps = 0;
        while let Some(task) = queue.pop() {
            steps += 1;
            prop_assert!(steps <= 100, "scheduler did not terminate");

            let outcome = if failing.contains(&task) {
                TaskOutcome::Failed(ActionFailure::message("x"))
            } else {
                TaskOutcome::Success(ActionOutput::empty())
            };
            let step = scheduler.step_completion(&task, &outcome);
            for t in step.newly_scheduled {
                started.push(t.name.clone());
                queue.push(t.name);
            }
        }

        prop_assert!(scheduler.is_idle());
        for task in &started {
            for dep in pipeline.graph().dependencies_of(task) {
                prop_assert_eq!(scheduler.run_state_of(dep), Some(TaskRunState::Succeeded));
            }
        }
        for (name, state) in scheduler.run_states() {
            prop_assert!(state.is_terminal(), "{} ended {:?}", name, state);
        }
    }
}

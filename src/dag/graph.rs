// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::engine::TaskName;
use crate::errors::{PipedagError, Result};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct dependencies: tasks that must succeed before this one can run.
    deps: Vec<TaskName>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<TaskName>,
}

/// In-memory dependency graph keyed by task name.
///
/// Nodes may reference dependencies that were never added; those are
/// reported by [`DagGraph::missing_dependency`] and by the traversal methods
/// rather than rejected on insertion, so tasks can be declared in any order.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: BTreeMap<TaskName, DagNode>,
}

impl DagGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with its dependency list, wiring `dependents` both ways.
    ///
    /// Re-adding an existing name is a caller error; the pipeline checks for
    /// duplicates before it gets here.
    pub fn add_task(&mut self, name: &str, deps: &[TaskName]) {
        let mut node = DagNode {
            deps: deps.to_vec(),
            dependents: Vec::new(),
        };

        // Earlier nodes that already named this one as a dependency.
        for (other, other_node) in self.nodes.iter() {
            if other_node.deps.iter().any(|d| d == name) {
                node.dependents.push(other.clone());
            }
        }

        for dep in deps {
            if let Some(dep_node) = self.nodes.get_mut(dep) {
                dep_node.dependents.push(name.to_string());
            }
        }

        self.nodes.insert(name.to_string(), node);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Return all task names, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one as a dependency).
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// First `(task, dependency)` pair whose dependency was never added.
    pub fn missing_dependency(&self) -> Option<(&str, &str)> {
        self.nodes.iter().find_map(|(name, node)| {
            node.deps
                .iter()
                .find(|d| !self.nodes.contains_key(*d))
                .map(|d| (name.as_str(), d.as_str()))
        })
    }

    /// `target` plus every task it transitively depends on.
    pub fn required_by(&self, target: &str) -> Result<BTreeSet<TaskName>> {
        if !self.contains(target) {
            return Err(PipedagError::UnknownTask(target.to_string()));
        }

        let mut seen: BTreeSet<TaskName> = BTreeSet::new();
        let mut stack: Vec<&str> = vec![target];

        while let Some(name) = stack.pop() {
            if !seen.insert(name.to_string()) {
                continue;
            }
            for dep in self.dependencies_of(name) {
                if !self.contains(dep) {
                    return Err(PipedagError::UnknownDependency {
                        task: name.to_string(),
                        dependency: dep.clone(),
                    });
                }
                stack.push(dep.as_str());
            }
        }

        Ok(seen)
    }

    /// Topological order of the tasks `target` requires, dependencies first.
    ///
    /// Fails with `CyclicDependency` if that subgraph contains a cycle.
    pub fn topological_order(&self, target: &str) -> Result<Vec<TaskName>> {
        let required = self.required_by(target)?;
        self.sort_subset(&required)
    }

    /// Check the whole graph for unknown dependencies and cycles.
    pub fn check(&self) -> Result<()> {
        if let Some((task, dep)) = self.missing_dependency() {
            return Err(PipedagError::UnknownDependency {
                task: task.to_string(),
                dependency: dep.to_string(),
            });
        }
        let all: BTreeSet<TaskName> = self.nodes.keys().cloned().collect();
        self.sort_subset(&all).map(|_| ())
    }

    fn sort_subset(&self, subset: &BTreeSet<TaskName>) -> Result<Vec<TaskName>> {
        // Edge direction: dep -> task, so a topological order lists
        // dependencies before their dependents.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for name in subset {
            graph.add_node(name.as_str());
        }
        for name in subset {
            for dep in self.dependencies_of(name) {
                if subset.contains(dep) {
                    graph.add_edge(dep.as_str(), name.as_str(), ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|s| s.to_string()).collect()),
            Err(cycle) => {
                let node = cycle.node_id();
                let members = tarjan_scc(&graph)
                    .into_iter()
                    .find(|scc| scc.contains(&node))
                    .unwrap_or_else(|| vec![node]);
                let mut names: Vec<TaskName> =
                    members.into_iter().map(|s| s.to_string()).collect();
                names.sort();
                Err(PipedagError::CyclicDependency(names))
            }
        }
    }
}

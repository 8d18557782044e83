//! Dependency closure queries.

use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::graph::TaskGraph;

/// Every task reachable from `task_id` over blocking edges.
///
/// The start node is never part of its own closure, even when a cycle leads
/// back to it. Unknown ids and tasks without dependencies yield an empty set.
pub fn transitive_deps(graph: &TaskGraph, task_id: &str) -> BTreeSet<String> {
    closure(graph, task_id, TaskGraph::neighbors)
}

/// Every task that depends on `task_id`, directly or through other tasks.
pub fn transitive_dependents(graph: &TaskGraph, task_id: &str) -> BTreeSet<String> {
    closure(graph, task_id, TaskGraph::dependents)
}

fn closure<'g>(
    graph: &'g TaskGraph,
    task_id: &'g str,
    step: fn(&'g TaskGraph, &str) -> &'g [String],
) -> BTreeSet<String> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();

    visited.insert(task_id);
    queue.push_back(task_id);

    while let Some(current) = queue.pop_front() {
        for next in step(graph, current) {
            if visited.insert(next.as_str()) {
                queue.push_back(next.as_str());
            }
        }
    }

    visited.remove(task_id);
    visited.into_iter().map(str::to_string).collect()
}

/// The part of the closure that is not yet completed.
pub fn blocking_deps(graph: &TaskGraph, task_id: &str) -> BTreeSet<String> {
    transitive_deps(graph, task_id)
        .into_iter()
        .filter(|id| {
            graph
                .task(id)
                .map(|t| !t.normalized_status().is_completed())
                .unwrap_or(false)
        })
        .collect()
}

/// Whether anything in the closure of `task_id` is incomplete.
///
/// Stops at the first incomplete task instead of materializing the set.
pub fn has_blockers(graph: &TaskGraph, task_id: &str) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![task_id];
    visited.insert(task_id);

    while let Some(current) = stack.pop() {
        for dep in graph.neighbors(current) {
            if !visited.insert(dep.as_str()) {
                continue;
            }
            let incomplete = graph
                .task(dep)
                .map(|t| !t.normalized_status().is_completed())
                .unwrap_or(false);
            if incomplete {
                return true;
            }
            stack.push(dep.as_str());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use padai_core::{DependencyEdge, DependencyType, Task};

    fn task(id: &str, status: &str) -> Task {
        let mut t = Task::new(id, id);
        t.status = status.to_string();
        t
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_chain_closure() {
        let graph = TaskGraph::build(
            vec![task("a", "open"), task("b", "open"), task("c", "open")],
            vec![DependencyEdge::blocks("c", "b"), DependencyEdge::blocks("b", "a")],
        );
        assert_eq!(transitive_deps(&graph, "c"), set(&["a", "b"]));
        assert_eq!(transitive_deps(&graph, "a"), set(&[]));
    }

    #[test]
    fn test_cycle_terminates_and_excludes_start() {
        let graph = TaskGraph::build(
            vec![task("a", "open"), task("b", "open"), task("c", "open")],
            vec![
                DependencyEdge::blocks("a", "b"),
                DependencyEdge::blocks("b", "c"),
                DependencyEdge::blocks("c", "a"),
            ],
        );
        assert_eq!(transitive_deps(&graph, "a"), set(&["b", "c"]));
        assert_eq!(blocking_deps(&graph, "b"), set(&["a", "c"]));
        assert!(has_blockers(&graph, "c"));
    }

    #[test]
    fn test_dependents_closure_follows_reverse_edges() {
        // d -> c -> a, b -> a, and e depends on nothing
        let graph = TaskGraph::build(
            vec![
                task("a", "open"),
                task("b", "open"),
                task("c", "open"),
                task("d", "open"),
                task("e", "open"),
            ],
            vec![
                DependencyEdge::blocks("b", "a"),
                DependencyEdge::blocks("c", "a"),
                DependencyEdge::blocks("d", "c"),
                DependencyEdge {
                    dep_type: DependencyType::Related,
                    ..DependencyEdge::blocks("e", "a")
                },
            ],
        );
        assert_eq!(transitive_dependents(&graph, "a"), set(&["b", "c", "d"]));
        assert_eq!(transitive_dependents(&graph, "c"), set(&["d"]));
        assert!(transitive_dependents(&graph, "d").is_empty());
        assert!(transitive_dependents(&graph, "missing").is_empty());
        for id in ["b", "c", "d"] {
            assert!(transitive_deps(&graph, id).contains("a"));
        }
    }

    #[test]
    fn test_unknown_id_is_empty() {
        let graph = TaskGraph::build(vec![task("a", "open")], vec![]);
        assert!(transitive_deps(&graph, "missing").is_empty());
        assert!(blocking_deps(&graph, "missing").is_empty());
        assert!(!has_blockers(&graph, "missing"));
    }

    #[test]
    fn test_completed_deps_do_not_block() {
        // d -> c (done) -> b (open): b still blocks d through the completed c.
        let graph = TaskGraph::build(
            vec![task("b", "open"), task("c", "closed"), task("d", "open")],
            vec![DependencyEdge::blocks("d", "c"), DependencyEdge::blocks("c", "b")],
        );
        assert_eq!(transitive_deps(&graph, "d"), set(&["b", "c"]));
        assert_eq!(blocking_deps(&graph, "d"), set(&["b"]));
        assert_eq!(blocking_deps(&graph, "c"), set(&["b"]));
        assert!(has_blockers(&graph, "d"));
    }

    #[test]
    fn test_has_blockers_agrees_with_blocking_deps() {
        let graph = TaskGraph::build(
            vec![
                task("a", "done"),
                task("b", "completed"),
                task("c", "open"),
                task("d", "in_progress"),
            ],
            vec![
                DependencyEdge::blocks("c", "a"),
                DependencyEdge::blocks("c", "b"),
                DependencyEdge::blocks("d", "c"),
            ],
        );
        for id in ["a", "b", "c", "d", "nope"] {
            assert_eq!(has_blockers(&graph, id), !blocking_deps(&graph, id).is_empty());
        }
    }
}

//! Adjacency over tasks and their dependency edges.
//!
//! A [`TaskGraph`] is built wholesale from the store's task and edge lists and
//! never mutated in place afterwards; the coordinator publishes a new graph
//! for every committed change.

use padai_core::{DependencyEdge, Task};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Something the build skipped or repaired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphAnomaly {
    /// Edge endpoint names a task that does not exist.
    DanglingEdge {
        issue_id: String,
        depends_on_id: String,
    },
    SelfLoop { task_id: String },
    /// Same (issue, dependency, type) triple seen more than once.
    DuplicateEdge {
        issue_id: String,
        depends_on_id: String,
        dep_type: String,
    },
    /// Two records share an id; the later one was kept.
    DuplicateTask { task_id: String },
}

impl GraphAnomaly {
    /// Dangling edges and self-loops are malformations; strict mode refuses them.
    /// Duplicates are repaired silently in both modes.
    pub fn is_malformation(&self) -> bool {
        matches!(
            self,
            GraphAnomaly::DanglingEdge { .. } | GraphAnomaly::SelfLoop { .. }
        )
    }
}

impl fmt::Display for GraphAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphAnomaly::DanglingEdge {
                issue_id,
                depends_on_id,
            } => write!(f, "dangling edge {} -> {}", issue_id, depends_on_id),
            GraphAnomaly::SelfLoop { task_id } => write!(f, "self-loop on {}", task_id),
            GraphAnomaly::DuplicateEdge {
                issue_id,
                depends_on_id,
                dep_type,
            } => write!(
                f,
                "duplicate {} edge {} -> {}",
                dep_type, issue_id, depends_on_id
            ),
            GraphAnomaly::DuplicateTask { task_id } => write!(f, "duplicate task {}", task_id),
        }
    }
}

/// Tasks plus forward and reverse `blocks` adjacency.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: HashMap<String, Task>,
    /// task -> tasks it depends on (blocks edges only)
    forward: HashMap<String, Vec<String>>,
    /// task -> tasks that depend on it (blocks edges only)
    reverse: HashMap<String, Vec<String>>,
    /// task -> resolved outgoing edges of every type
    edges: HashMap<String, Vec<DependencyEdge>>,
    anomalies: Vec<GraphAnomaly>,
}

impl TaskGraph {
    /// Build the graph, dropping dangling edges and self-loops and
    /// collapsing duplicates. Never fails.
    pub fn build(tasks: Vec<Task>, edges: Vec<DependencyEdge>) -> Self {
        let mut graph = TaskGraph::default();

        for task in tasks {
            if let Some(prev) = graph.tasks.insert(task.id.clone(), task) {
                graph.anomalies.push(GraphAnomaly::DuplicateTask { task_id: prev.id });
            }
        }

        let mut seen = HashSet::new();
        for edge in edges {
            if edge.is_self_loop() {
                graph.anomalies.push(GraphAnomaly::SelfLoop {
                    task_id: edge.issue_id,
                });
                continue;
            }
            if !graph.tasks.contains_key(&edge.issue_id)
                || !graph.tasks.contains_key(&edge.depends_on_id)
            {
                graph.anomalies.push(GraphAnomaly::DanglingEdge {
                    issue_id: edge.issue_id,
                    depends_on_id: edge.depends_on_id,
                });
                continue;
            }

            let key = (
                edge.issue_id.clone(),
                edge.depends_on_id.clone(),
                edge.dep_type.clone(),
            );
            if !seen.insert(key) {
                graph.anomalies.push(GraphAnomaly::DuplicateEdge {
                    issue_id: edge.issue_id,
                    depends_on_id: edge.depends_on_id,
                    dep_type: edge.dep_type.to_string(),
                });
                continue;
            }

            if edge.dep_type.affects_ready_work() {
                graph
                    .forward
                    .entry(edge.issue_id.clone())
                    .or_default()
                    .push(edge.depends_on_id.clone());
                graph
                    .reverse
                    .entry(edge.depends_on_id.clone())
                    .or_default()
                    .push(edge.issue_id.clone());
            }
            graph.edges.entry(edge.issue_id.clone()).or_default().push(edge);
        }

        graph
    }

    /// The task record kept for `id`.
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Whether any record carried `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Every task, in no particular order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Number of distinct task ids.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Direct blocking dependencies of `id`.
    pub fn neighbors(&self, id: &str) -> &[String] {
        self.forward.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tasks directly blocked by `id`.
    pub fn dependents(&self, id: &str) -> &[String] {
        self.reverse.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Outgoing edges of every type that survived the build.
    pub fn edges_of(&self, id: &str) -> &[DependencyEdge] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of edges kept.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// What the build dropped or repaired, in the order it was found.
    pub fn anomalies(&self) -> &[GraphAnomaly] {
        &self.anomalies
    }

    /// Copy of this graph with one task record replaced. Edges are untouched.
    pub(crate) fn with_task(&self, task: Task) -> Self {
        let mut next = self.clone();
        next.tasks.insert(task.id.clone(), task);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use padai_core::DependencyType;

    fn tasks(ids: &[&str]) -> Vec<Task> {
        ids.iter().map(|id| Task::new(*id, *id)).collect()
    }

    #[test]
    fn test_adjacency_both_directions() {
        let graph = TaskGraph::build(
            tasks(&["a", "b", "c"]),
            vec![DependencyEdge::blocks("b", "a"), DependencyEdge::blocks("c", "a")],
        );

        assert_eq!(graph.neighbors("b"), ["a".to_string()]);
        assert_eq!(graph.dependents("a"), ["b".to_string(), "c".to_string()]);
        assert!(graph.neighbors("a").is_empty());
        assert!(graph.dependents("zzz").is_empty());
        assert!(graph.anomalies().is_empty());
    }

    #[test]
    fn test_tolerates_malformed_edges() {
        let graph = TaskGraph::build(
            tasks(&["a", "b"]),
            vec![
                DependencyEdge::blocks("b", "ghost"),
                DependencyEdge::blocks("ghost", "a"),
                DependencyEdge::blocks("a", "a"),
                DependencyEdge::blocks("b", "a"),
                DependencyEdge::blocks("b", "a"),
            ],
        );

        assert_eq!(graph.neighbors("b"), ["a".to_string()]);
        assert!(graph.neighbors("a").is_empty());
        assert_eq!(graph.edge_count(), 1);

        let malformed = graph.anomalies().iter().filter(|a| a.is_malformation()).count();
        assert_eq!(malformed, 3);
        assert!(graph
            .anomalies()
            .iter()
            .any(|a| matches!(a, GraphAnomaly::DuplicateEdge { .. })));
    }

    #[test]
    fn test_non_blocking_edges_kept_for_display_only() {
        let mut related = DependencyEdge::blocks("b", "a");
        related.dep_type = DependencyType::Related;

        let graph = TaskGraph::build(tasks(&["a", "b"]), vec![related]);

        assert!(graph.neighbors("b").is_empty());
        assert_eq!(graph.edges_of("b").len(), 1);
        assert_eq!(graph.edges_of("b")[0].dep_type, DependencyType::Related);
    }

    #[test]
    fn test_duplicate_task_keeps_last() {
        let mut second = Task::new("a", "second");
        second.priority = 9;
        let graph = TaskGraph::build(vec![Task::new("a", "first"), second], vec![]);

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.task("a").unwrap().title, "second");
        assert_eq!(
            graph.anomalies(),
            [GraphAnomaly::DuplicateTask {
                task_id: "a".to_string()
            }]
        );
    }
}

//! Immutable view of the task graph that every read works against.

use padai_core::{Error, PriorityOrder, Result, Status, StatusSummary, Task, TaskView};
use std::collections::{BTreeSet, HashMap};

use crate::analyzer;
use crate::graph::TaskGraph;
use crate::readiness;

/// One published state of the engine.
///
/// Readers hold an `Arc<Snapshot>` and may compute on it for as long as they
/// like; writers never touch a published snapshot, they publish a new one.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub(crate) graph: TaskGraph,
    /// Status each in-progress task had before it was claimed.
    pub(crate) pre_claim: HashMap<String, Status>,
    pub(crate) order: PriorityOrder,
}

impl Snapshot {
    pub(crate) fn new(graph: TaskGraph, order: PriorityOrder) -> Self {
        Self {
            graph,
            pre_claim: HashMap::new(),
            order,
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.graph.task(task_id)
    }

    pub(crate) fn require(&self, task_id: &str) -> Result<&Task> {
        self.graph
            .task(task_id)
            .ok_or_else(|| Error::NotFound(task_id.to_string()))
    }

    /// Unknown ids are never ready.
    pub fn is_ready(&self, task_id: &str) -> bool {
        self.graph
            .task(task_id)
            .map(|t| readiness::is_ready(&self.graph, t))
            .unwrap_or(false)
    }

    pub fn list_ready(&self) -> Vec<Task> {
        readiness::list_ready(&self.graph, self.order)
    }

    pub fn transitive_deps(&self, task_id: &str) -> BTreeSet<String> {
        analyzer::transitive_deps(&self.graph, task_id)
    }

    /// Tasks that wait on `task_id`, directly or transitively.
    pub fn transitive_dependents(&self, task_id: &str) -> BTreeSet<String> {
        analyzer::transitive_dependents(&self.graph, task_id)
    }

    pub fn blocking_deps(&self, task_id: &str) -> BTreeSet<String> {
        analyzer::blocking_deps(&self.graph, task_id)
    }

    pub fn view(&self, task_id: &str) -> Result<TaskView> {
        let task = self.require(task_id)?;
        Ok(self.view_of(task))
    }

    fn view_of(&self, task: &Task) -> TaskView {
        TaskView {
            task: task.clone(),
            effective_status: readiness::effective_status(&self.graph, task),
            dependencies: self.graph.edges_of(&task.id).to_vec(),
            blocked_by: self.blocking_deps(&task.id),
        }
    }

    /// Every task, in the same order `list_ready` uses.
    pub fn list_all(&self) -> Vec<TaskView> {
        let mut tasks: Vec<&Task> = self.graph.tasks().collect();
        tasks.sort_by(|a, b| readiness::compare_tasks(self.order, a, b));
        tasks.into_iter().map(|t| self.view_of(t)).collect()
    }

    pub fn status(&self) -> StatusSummary {
        readiness::summarize(&self.graph)
    }

    /// Status an abandoned task reverts to.
    pub(crate) fn pre_claim_status(&self, task_id: &str) -> Status {
        self.pre_claim
            .get(task_id)
            .copied()
            .unwrap_or(Status::Open)
    }

    /// Next snapshot with `task` replacing its current record.
    pub(crate) fn with_task(&self, task: Task) -> Self {
        Self {
            graph: self.graph.with_task(task),
            pre_claim: self.pre_claim.clone(),
            order: self.order,
        }
    }
}

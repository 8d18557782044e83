//! Readiness evaluation and ready-list ordering.

use padai_core::{PriorityOrder, Status, StatusSummary, Task};
use std::cmp::Ordering;

use crate::analyzer::has_blockers;
use crate::graph::TaskGraph;

/// A task is ready when its own status is claimable and nothing it
/// transitively depends on is incomplete.
pub fn is_ready(graph: &TaskGraph, task: &Task) -> bool {
    task.normalized_status().is_claimable() && !has_blockers(graph, &task.id)
}

/// Status shown to callers: open/ready tasks with incomplete blockers read as
/// `Blocked`.
pub fn effective_status(graph: &TaskGraph, task: &Task) -> Status {
    let status = task.normalized_status();
    if status.is_claimable() && has_blockers(graph, &task.id) {
        Status::Blocked
    } else {
        status
    }
}

/// Priority first (direction per `order`), then oldest first, then id.
pub fn compare_tasks(order: PriorityOrder, a: &Task, b: &Task) -> Ordering {
    let by_priority = match order {
        PriorityOrder::HigherFirst => b.priority.cmp(&a.priority),
        PriorityOrder::LowerFirst => a.priority.cmp(&b.priority),
    };
    by_priority
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// All ready tasks in claim order. Identical input gives identical output.
pub fn list_ready(graph: &TaskGraph, order: PriorityOrder) -> Vec<Task> {
    let mut ready: Vec<Task> = graph
        .tasks()
        .filter(|t| is_ready(graph, t))
        .cloned()
        .collect();
    ready.sort_by(|a, b| compare_tasks(order, a, b));
    ready
}

/// Per-status counts.
///
/// `open`, `in_progress`, and `completed` count stored statuses; `ready`
/// counts claimable tasks and `blocked` counts effective blocked tasks, so the
/// open bucket overlaps both of them.
pub fn summarize(graph: &TaskGraph) -> StatusSummary {
    let mut summary = StatusSummary {
        total: graph.len(),
        ..StatusSummary::default()
    };

    for task in graph.tasks() {
        match task.normalized_status() {
            Status::Open => summary.open += 1,
            Status::InProgress => summary.in_progress += 1,
            Status::Completed => summary.completed += 1,
            Status::Ready | Status::Blocked => {}
        }
        match effective_status(graph, task) {
            Status::Blocked => summary.blocked += 1,
            Status::Open | Status::Ready => summary.ready += 1,
            _ => {}
        }
    }

    summary
}

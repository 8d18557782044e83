//! Core data structures for PadAI coordination.
//!
//! Tasks and dependency edges use the beads issue JSON layout so records
//! exported by `bd export` load without translation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::status::Status;

/// Task represents a unit of coordinated work.
///
/// `status` is kept as the raw store string; call [`Task::normalized_status`]
/// for the canonical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    // ===== Core Identification =====
    pub id: String,

    // ===== Task Content =====
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    // ===== Status & Workflow =====
    #[serde(default)]
    pub status: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_issue_type")]
    pub issue_type: String,

    // ===== Assignment =====
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,

    // ===== Timestamps =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Completion notes or abandon reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn default_priority() -> i32 {
    2
}

fn default_issue_type() -> String {
    "task".to_string()
}

impl Task {
    /// Create an open task with default priority and no assignee.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: Status::Open.as_str().to_string(),
            priority: default_priority(),
            issue_type: default_issue_type(),
            assignee: None,
            labels: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            notes: None,
        }
    }

    /// Canonical status of this task's raw status string.
    pub fn normalized_status(&self) -> Status {
        Status::normalize(&self.status)
    }

    /// Set the status to its canonical string and bump `updated_at`.
    pub fn set_status(&mut self, status: Status) {
        self.status = status.as_str().to_string();
        self.update_timestamp();
    }

    /// Updates the updated_at timestamp to now
    pub fn update_timestamp(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Validate checks the fields a store needs to key and display the task.
    pub fn validate(&self) -> crate::Result<()> {
        if self.id.trim().is_empty() {
            return Err(crate::Error::InvalidArgument("task id is required".to_string()));
        }
        if self.title.is_empty() {
            return Err(crate::Error::InvalidArgument(format!(
                "task {} has no title",
                self.id
            )));
        }
        Ok(())
    }
}

/// DependencyType categorizes an edge. Only `Blocks` gates readiness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DependencyType {
    #[default]
    Blocks,
    ParentChild,
    Related,
    DiscoveredFrom,
    /// Any type string the engine does not model.
    Other(String),
}

impl DependencyType {
    /// Returns true if this dependency type blocks work.
    pub fn affects_ready_work(&self) -> bool {
        matches!(self, DependencyType::Blocks)
    }
}

impl From<String> for DependencyType {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "blocks" | "" => DependencyType::Blocks,
            "parent-child" | "parent" => DependencyType::ParentChild,
            "related" => DependencyType::Related,
            "discovered-from" => DependencyType::DiscoveredFrom,
            _ => DependencyType::Other(raw),
        }
    }
}

impl From<DependencyType> for String {
    fn from(dep_type: DependencyType) -> Self {
        dep_type.to_string()
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyType::Blocks => "blocks",
            DependencyType::ParentChild => "parent-child",
            DependencyType::Related => "related",
            DependencyType::DiscoveredFrom => "discovered-from",
            DependencyType::Other(raw) => raw.as_str(),
        };
        write!(f, "{}", s)
    }
}

/// DependencyEdge: `issue_id` depends on `depends_on_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Empty in embedded beads records; the owning issue fills it in.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issue_id: String,
    pub depends_on_id: String,
    #[serde(rename = "type", default)]
    pub dep_type: DependencyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl DependencyEdge {
    /// A `blocks` edge: `issue_id` cannot start until `depends_on_id` completes.
    pub fn blocks(issue_id: impl Into<String>, depends_on_id: impl Into<String>) -> Self {
        Self {
            issue_id: issue_id.into(),
            depends_on_id: depends_on_id.into(),
            dep_type: DependencyType::Blocks,
            created_at: None,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.issue_id == self.depends_on_id
    }
}

/// A task together with everything the engine resolved about it.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    /// `Blocked` when the task is open/ready but has incomplete blockers.
    pub effective_status: Status,
    /// Resolved outgoing edges of every type.
    pub dependencies: Vec<DependencyEdge>,
    /// Transitive blockers that are not yet completed.
    pub blocked_by: BTreeSet<String>,
}

/// Counts of tasks per effective status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub open: usize,
    pub ready: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub blocked: usize,
}

//! Canonical task status and the normalizer that maps raw store strings onto it.
//!
//! The store's status vocabulary evolves independently of the engine, so
//! [`Status::normalize`] is total: anything it does not recognize is `Open`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical status of a task as seen by the coordination engine.
///
/// `Blocked` is never written by the engine. It appears either because the
/// store said so, or as the derived effective status of an open task with
/// incomplete blocking dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    Ready,
    InProgress,
    Completed,
    Blocked,
}

impl Status {
    /// Map an arbitrary status string to its canonical form. Never fails.
    pub fn normalize(raw: &str) -> Status {
        let key: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match key.as_str() {
            "ready" => Status::Ready,
            "in_progress" | "inprogress" | "claimed" | "active" | "started" | "doing"
            | "working" | "hooked" => Status::InProgress,
            "completed" | "complete" | "closed" | "done" | "resolved" | "finished" => {
                Status::Completed
            }
            "blocked" => Status::Blocked,
            // open, new, todo, pending, backlog, reopened, "" and everything unknown
            _ => Status::Open,
        }
    }

    /// The string the engine writes back to the store for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::Ready => "ready",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Blocked => "blocked",
        }
    }

    /// Whether a task in this status may be claimed, dependencies permitting.
    pub fn is_claimable(&self) -> bool {
        matches!(self, Status::Open | Status::Ready)
    }

    /// Completed tasks never block anything again.
    pub fn is_completed(&self) -> bool {
        matches!(self, Status::Completed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

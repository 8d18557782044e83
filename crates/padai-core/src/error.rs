//! Error types for the PadAI coordination engine.

use thiserror::Error;

/// Core error type for coordination operations.
///
/// Mutations surface one of these named kinds directly. Read paths never
/// produce them for graph anomalies; those are skipped and logged instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("invalid state transition for {task_id}: {from} -> {to}")]
    InvalidStateTransition {
        task_id: String,
        from: String,
        to: String,
    },

    #[error("no tasks available")]
    NoTasksAvailable,

    #[error("claim gave up after {attempts} conflicting attempts")]
    ConcurrencyExhausted { attempts: usize },

    #[error("malformed dependency graph: {0}")]
    MalformedGraph(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for the expected "nothing to claim" outcome, which callers should
    /// poll on rather than report as a failure.
    pub fn is_no_tasks(&self) -> bool {
        matches!(self, Error::NoTasksAvailable)
    }

    /// True when retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConcurrencyExhausted { .. } | Error::NoTasksAvailable)
    }

    /// Build an `InvalidStateTransition` for `task_id`.
    pub fn transition(task_id: &str, from: impl ToString, to: impl ToString) -> Self {
        Error::InvalidStateTransition {
            task_id: task_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Result type alias using the PadAI Error type.
pub type Result<T> = std::result::Result<T, Error>;

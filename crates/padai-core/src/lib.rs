//! Core types for the PadAI coordination engine.
//!
//! This crate provides the task and dependency model, the status normalizer,
//! engine configuration and the shared error type used by the storage,
//! engine and CLI crates.

pub mod config;
pub mod error;
pub mod status;
pub mod types;

pub use config::{EngineConfig, PriorityOrder};
pub use error::{Error, Result};
pub use status::Status;

// Re-export main types for convenience
pub use types::{DependencyEdge, DependencyType, StatusSummary, Task, TaskView};

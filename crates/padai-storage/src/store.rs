//! The durable store port.
//!
//! The engine treats the store as an external collaborator with no
//! concurrency control of its own. Every read-modify-write against it happens
//! inside the engine's writer critical section while holding [`TaskStore::lock`],
//! which is what makes that section exclusive across processes sharing one
//! store.

use async_trait::async_trait;
use padai_core::{DependencyEdge, Result, Task};
use std::any::Any;

/// Everything a store holds, read in one pass.
#[derive(Debug, Clone, Default)]
pub struct StoreContents {
    pub tasks: Vec<Task>,
    pub edges: Vec<DependencyEdge>,
}

/// Exclusive hold on a store. Released when dropped.
pub struct StoreLock {
    _guard: Option<Box<dyn Any + Send + Sync>>,
}

impl StoreLock {
    /// Wrap whatever keeps the store locked for as long as it lives.
    pub fn new(guard: impl Any + Send + Sync) -> Self {
        Self {
            _guard: Some(Box::new(guard)),
        }
    }

    /// A lock that holds nothing, for stores no one else can reach.
    pub fn unshared() -> Self {
        Self { _guard: None }
    }
}

impl std::fmt::Debug for StoreLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLock")
            .field("held", &self._guard.is_some())
            .finish()
    }
}

/// Durable storage for tasks and dependency edges.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn load_all_tasks(&self) -> Result<Vec<Task>>;

    async fn load_all_edges(&self) -> Result<Vec<DependencyEdge>>;

    /// Replace every record keyed by `task.id`, or insert one if none exists.
    ///
    /// Callers that read, check and then write must hold [`TaskStore::lock`]
    /// across all three steps.
    async fn persist_task(&self, task: &Task) -> Result<()>;

    /// Load tasks and edges together.
    ///
    /// Stores that can read both from a single source should override this so
    /// the two lists come from the same state.
    async fn load_all(&self) -> Result<StoreContents> {
        let tasks = self.load_all_tasks().await?;
        let edges = self.load_all_edges().await?;
        Ok(StoreContents { tasks, edges })
    }

    /// Take exclusive access to the store, waiting for other holders.
    ///
    /// Exclusion must cover every handle on the same underlying data, not
    /// only this value. The default holds nothing.
    async fn lock(&self) -> Result<StoreLock> {
        Ok(StoreLock::unshared())
    }
}

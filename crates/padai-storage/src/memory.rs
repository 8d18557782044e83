//! In-memory task store for tests and embedding.

use async_trait::async_trait;
use padai_core::{DependencyEdge, Error, Result, Task};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::store::{StoreContents, StoreLock, TaskStore};

#[derive(Debug, Default)]
struct Inner {
    tasks: Vec<Task>,
    edges: Vec<DependencyEdge>,
    fail_persist: bool,
    persist_count: usize,
}

/// Task store that keeps everything in process memory.
///
/// Cloning shares the underlying state, so a test can hand one clone to the
/// engine and inspect or mutate the other. Clones also share one
/// [`TaskStore::lock`], so engines built over clones exclude each other the
/// way separate processes over one file do.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
    exclusive: Arc<tokio::sync::Mutex<()>>,
}

impl InMemoryStore {
    pub fn new(tasks: Vec<Task>, edges: Vec<DependencyEdge>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                tasks,
                edges,
                ..Inner::default()
            })),
            exclusive: Arc::default(),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Store("in-memory store lock poisoned".to_string()))
    }

    /// Make every subsequent `persist_task` fail until reset.
    pub fn set_fail_persist(&self, fail: bool) -> Result<()> {
        self.state()?.fail_persist = fail;
        Ok(())
    }

    /// Number of successful `persist_task` calls.
    pub fn persist_count(&self) -> Result<usize> {
        Ok(self.state()?.persist_count)
    }

    /// Current copy of a stored task.
    pub fn task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.state()?.tasks.iter().find(|t| t.id == id).cloned())
    }

    /// Add an edge behind the engine's back; the engine sees it the next time
    /// it reads the store.
    pub fn add_edge(&self, edge: DependencyEdge) -> Result<()> {
        self.state()?.edges.push(edge);
        Ok(())
    }

    /// Insert or replace a task without going through `persist_task`.
    pub fn put_task(&self, task: Task) -> Result<()> {
        upsert(&mut self.state()?.tasks, task);
        Ok(())
    }
}

/// Replace every entry with the task's id, or append it.
fn upsert(tasks: &mut Vec<Task>, task: Task) {
    let mut matched = false;
    for slot in tasks.iter_mut().filter(|t| t.id == task.id) {
        *slot = task.clone();
        matched = true;
    }
    if !matched {
        tasks.push(task);
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn load_all_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.state()?.tasks.clone())
    }

    async fn load_all_edges(&self) -> Result<Vec<DependencyEdge>> {
        Ok(self.state()?.edges.clone())
    }

    async fn load_all(&self) -> Result<StoreContents> {
        let inner = self.state()?;
        Ok(StoreContents {
            tasks: inner.tasks.clone(),
            edges: inner.edges.clone(),
        })
    }

    async fn persist_task(&self, task: &Task) -> Result<()> {
        let mut inner = self.state()?;
        if inner.fail_persist {
            return Err(Error::Store(format!("persist of {} rejected", task.id)));
        }
        upsert(&mut inner.tasks, task.clone());
        inner.persist_count += 1;
        Ok(())
    }

    async fn lock(&self) -> Result<StoreLock> {
        Ok(StoreLock::new(self.exclusive.clone().lock_owned().await))
    }
}

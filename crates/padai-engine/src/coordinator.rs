//! The coordination engine: snapshot queries plus serialized claim, complete
//! and abandon commands.
//!
//! Reads clone the published `Arc<Snapshot>` under a brief read lock and
//! compute without holding any lock. Every mutation runs inside one writer
//! critical section that persists to the store and then publishes the next
//! snapshot, so a command's effect is visible to every read that starts after
//! it returns.
//!
//! The writer section also holds the store's own lock and starts by reading
//! the store again. Another engine, in this process or another one, may have
//! written since our last publish; checks run against what the store holds
//! now, not against what this engine last saw.

use padai_core::{EngineConfig, Error, Result, Status, StatusSummary, Task, TaskView};
use padai_storage::{StoreLock, TaskStore};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::graph::{GraphAnomaly, TaskGraph};
use crate::policy::{ClaimPolicy, FirstReady};
use crate::snapshot::Snapshot;

/// What a load from the store produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub tasks: usize,
    pub edges: usize,
    pub anomalies: Vec<GraphAnomaly>,
}

/// Held for the length of one command.
struct WriteSection<'a> {
    _writer: MutexGuard<'a, ()>,
    _store: StoreLock,
    /// The store's contents as read after both locks were taken.
    current: Arc<Snapshot>,
}

/// Dependency-aware task coordinator shared by many agents.
pub struct Engine {
    store: Arc<dyn TaskStore>,
    config: EngineConfig,
    policy: Box<dyn ClaimPolicy>,
    snapshot: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl Engine {
    /// Create an engine and load the initial graph from `store`.
    pub async fn open(store: Arc<dyn TaskStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let engine = Self {
            store,
            snapshot: RwLock::new(Arc::new(Snapshot::new(
                TaskGraph::default(),
                config.priority_order,
            ))),
            config,
            policy: Box::new(FirstReady),
            writer: Mutex::new(()),
        };
        engine.reload().await?;
        Ok(engine)
    }

    /// Replace the claim policy.
    pub fn with_policy(mut self, policy: impl ClaimPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn publish(&self, next: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(next);
        match self.snapshot.write() {
            Ok(mut guard) => *guard = Arc::clone(&next),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&next),
        }
        next
    }

    /// Take the writer lock, then the store lock, then publish what the store
    /// holds.
    async fn write_section(&self) -> Result<WriteSection<'_>> {
        let writer = self.writer.lock().await;
        let store_lock = self.store.lock().await?;
        let current = self.refresh().await?;
        Ok(WriteSection {
            _writer: writer,
            _store: store_lock,
            current,
        })
    }

    /// Rebuild the graph from the store and publish it.
    ///
    /// In strict mode a malformed graph is refused and nothing is published.
    /// Pre-claim statuses carry over for tasks that are still in progress.
    async fn refresh(&self) -> Result<Arc<Snapshot>> {
        let contents = self.store.load_all().await?;
        let graph = TaskGraph::build(contents.tasks, contents.edges);

        let malformed: Vec<String> = graph
            .anomalies()
            .iter()
            .filter(|a| a.is_malformation())
            .map(|a| a.to_string())
            .collect();
        if self.config.strict_graph && !malformed.is_empty() {
            return Err(Error::MalformedGraph(malformed.join("; ")));
        }

        let previous = self.snapshot();
        let mut next = Snapshot::new(graph, self.config.priority_order);
        next.pre_claim = previous
            .pre_claim
            .iter()
            .filter(|(id, _)| {
                next.graph
                    .task(id)
                    .map(|t| t.normalized_status() == Status::InProgress)
                    .unwrap_or(false)
            })
            .map(|(id, status)| (id.clone(), *status))
            .collect();

        Ok(self.publish(next))
    }

    // ===== Queries =====

    pub fn list_ready(&self) -> Vec<Task> {
        self.snapshot().list_ready()
    }

    pub fn list_all(&self) -> Vec<TaskView> {
        self.snapshot().list_all()
    }

    /// Incomplete transitive blockers of `task_id`; empty for unknown ids.
    pub fn get_blocking(&self, task_id: &str) -> BTreeSet<String> {
        self.snapshot().blocking_deps(task_id)
    }

    pub fn transitive_deps(&self, task_id: &str) -> BTreeSet<String> {
        self.snapshot().transitive_deps(task_id)
    }

    pub fn is_ready(&self, task_id: &str) -> bool {
        self.snapshot().is_ready(task_id)
    }

    pub fn get(&self, task_id: &str) -> Result<TaskView> {
        self.snapshot().view(task_id)
    }

    pub fn status(&self) -> StatusSummary {
        self.snapshot().status()
    }

    // ===== Commands =====

    /// Reload tasks and edges from the store and publish a fresh graph.
    ///
    /// In strict mode a graph with dangling edges or self-loops is refused
    /// and the previous snapshot stays in place.
    pub async fn reload(&self) -> Result<LoadReport> {
        let section = self.write_section().await?;
        let graph = section.current.graph();

        for anomaly in graph.anomalies() {
            warn!("Graph anomaly: {}", anomaly);
        }

        let report = LoadReport {
            tasks: graph.len(),
            edges: graph.edge_count(),
            anomalies: graph.anomalies().to_vec(),
        };

        info!(
            tasks = report.tasks,
            edges = report.edges,
            anomalies = report.anomalies.len(),
            "Loaded task graph"
        );
        Ok(report)
    }

    /// Give `agent` the first ready task the policy picks.
    ///
    /// Candidates are computed from the published snapshot outside the
    /// critical section and re-checked against the store inside it. Stale candidates are skipped; a round in
    /// which every candidate went stale counts as one conflict, and more than
    /// `max_claim_conflicts` of those ends in `ConcurrencyExhausted`.
    pub async fn claim(&self, agent: &str) -> Result<Task> {
        let agent = validate_agent(agent)?;
        let mut conflicts = 0;

        loop {
            let ready = self.snapshot().list_ready();
            if ready.is_empty() {
                debug!(agent, "No ready tasks");
                return Err(Error::NoTasksAvailable);
            }
            let candidates = self.policy.candidates(agent, &ready);
            if candidates.is_empty() {
                debug!(agent, policy = self.policy.name(), "Policy declined every ready task");
                return Err(Error::NoTasksAvailable);
            }

            let section = self.write_section().await?;
            for task_id in &candidates {
                if section.current.is_ready(task_id) {
                    return self.commit_claim(&section.current, task_id, agent).await;
                }
                debug!(task_id = %task_id, agent, "Claim candidate no longer ready");
            }

            conflicts += 1;
            if conflicts > self.config.max_claim_conflicts {
                warn!(agent, attempts = conflicts, "Claim retries exhausted");
                return Err(Error::ConcurrencyExhausted {
                    attempts: conflicts,
                });
            }
        }
    }

    /// Claim one specific task for `agent`.
    pub async fn claim_task(&self, task_id: &str, agent: &str) -> Result<Task> {
        let agent = validate_agent(agent)?;
        let section = self.write_section().await?;
        let current = &section.current;

        let task = current.require(task_id)?;
        let status = task.normalized_status();
        if !status.is_claimable() {
            return Err(Error::transition(task_id, status, Status::InProgress));
        }
        if !current.blocking_deps(task_id).is_empty() {
            return Err(Error::transition(task_id, Status::Blocked, Status::InProgress));
        }

        self.commit_claim(current, task_id, agent).await
    }

    /// Caller holds a write section and has checked `task_id` is ready in `current`.
    async fn commit_claim(&self, current: &Snapshot, task_id: &str, agent: &str) -> Result<Task> {
        let mut task = current.require(task_id)?.clone();
        let before = task.normalized_status();

        task.set_status(Status::InProgress);
        task.assignee = Some(agent.to_string());
        self.store.persist_task(&task).await?;

        let mut next = current.with_task(task.clone());
        next.pre_claim.insert(task.id.clone(), before);
        self.publish(next);

        info!(task_id = %task.id, agent, "Claimed task");
        Ok(task)
    }

    /// Finish an in-progress task.
    pub async fn complete(&self, task_id: &str, notes: Option<&str>) -> Result<Task> {
        let section = self.write_section().await?;
        let current = &section.current;

        let mut task = current.require(task_id)?.clone();
        let status = task.normalized_status();
        if status != Status::InProgress {
            return Err(Error::transition(task_id, status, Status::Completed));
        }

        task.set_status(Status::Completed);
        if let Some(notes) = notes {
            task.notes = Some(notes.to_string());
        }
        self.store.persist_task(&task).await?;

        let mut next = current.with_task(task.clone());
        next.pre_claim.remove(task_id);
        let unblocked: Vec<&str> = next
            .graph
            .dependents(task_id)
            .iter()
            .filter(|id| next.is_ready(id))
            .map(String::as_str)
            .collect();
        if !unblocked.is_empty() {
            debug!(task_id, ?unblocked, "Completion unblocked dependents");
        }
        self.publish(next);

        info!(task_id, assignee = ?task.assignee, "Completed task");
        Ok(task)
    }

    /// Release an in-progress task back to the status it had before it was
    /// claimed.
    ///
    /// Abandoning a task nobody holds is a no-op that returns it unchanged.
    /// Completed tasks cannot be abandoned.
    pub async fn abandon(&self, task_id: &str, reason: Option<&str>) -> Result<Task> {
        let section = self.write_section().await?;
        let current = &section.current;

        let mut task = current.require(task_id)?.clone();
        let status = task.normalized_status();
        match status {
            Status::InProgress => {}
            Status::Completed => {
                return Err(Error::transition(task_id, status, Status::Open));
            }
            Status::Open | Status::Ready | Status::Blocked => {
                debug!(task_id, %status, "Abandon on unclaimed task is a no-op");
                return Ok(task);
            }
        }

        let revert_to = current.pre_claim_status(task_id);
        let agent = task.assignee.take();
        task.set_status(revert_to);
        if let Some(reason) = reason {
            task.notes = Some(reason.to_string());
        }
        self.store.persist_task(&task).await?;

        let mut next = current.with_task(task.clone());
        next.pre_claim.remove(task_id);
        self.publish(next);

        info!(task_id, agent = ?agent, status = %revert_to, "Abandoned task");
        Ok(task)
    }
}

fn validate_agent(agent: &str) -> Result<&str> {
    let trimmed = agent.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(
            "agent name must not be blank".to_string(),
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use padai_core::DependencyEdge;
    use padai_storage::InMemoryStore;

    async fn engine_with(tasks: Vec<Task>, edges: Vec<DependencyEdge>) -> (Engine, InMemoryStore) {
        let store = InMemoryStore::new(tasks, edges);
        let engine = Engine::open(Arc::new(store.clone()), EngineConfig::default())
            .await
            .unwrap();
        (engine, store)
    }

    fn with_status(id: &str, status: &str) -> Task {
        let mut t = Task::new(id, id);
        t.status = status.to_string();
        t
    }

    #[tokio::test]
    async fn test_blank_agent_rejected() {
        let (engine, _) = engine_with(vec![Task::new("a", "A")], vec![]).await;
        assert!(matches!(
            engine.claim("   ").await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.claim_task("a", "").await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(engine.is_ready("a"));
    }

    #[tokio::test]
    async fn test_abandon_restores_ready() {
        let (engine, store) = engine_with(vec![with_status("a", "ready")], vec![]).await;

        engine.claim("agent-1").await.unwrap();
        let task = engine.abandon("a", Some("need more context")).await.unwrap();

        assert_eq!(task.normalized_status(), Status::Ready);
        assert!(task.assignee.is_none());
        assert_eq!(task.notes.as_deref(), Some("need more context"));
        assert_eq!(store.task("a").unwrap().unwrap().status, "ready");
        assert!(engine.is_ready("a"));
    }

    #[tokio::test]
    async fn test_abandon_unclaimed_is_noop() {
        let (engine, store) = engine_with(vec![Task::new("a", "A")], vec![]).await;

        let task = engine.abandon("a", Some("whatever")).await.unwrap();
        assert_eq!(task.status, "open");
        assert!(task.notes.is_none());
        assert_eq!(store.persist_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_abandon_loaded_in_progress_reverts_to_open() {
        let mut held = with_status("a", "hooked");
        held.assignee = Some("ghost".to_string());
        let (engine, _) = engine_with(vec![held], vec![]).await;

        let task = engine.abandon("a", None).await.unwrap();
        assert_eq!(task.status, "open");
        assert!(task.assignee.is_none());
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_snapshot_unchanged() {
        let (engine, store) = engine_with(vec![Task::new("a", "A")], vec![]).await;
        store.set_fail_persist(true).unwrap();

        assert!(matches!(engine.claim("agent-1").await, Err(Error::Store(_))));
        assert!(engine.is_ready("a"));
        assert!(engine.get("a").unwrap().task.assignee.is_none());
    }

    #[tokio::test]
    async fn test_pre_claim_memory_survives_reload() {
        let (engine, store) = engine_with(
            vec![with_status("a", "ready"), Task::new("b", "B")],
            vec![],
        )
        .await;

        engine.claim_task("a", "agent-1").await.unwrap();
        store.put_task(Task::new("c", "C")).unwrap();
        let report = engine.reload().await.unwrap();
        assert_eq!(report.tasks, 3);

        let task = engine.abandon("a", None).await.unwrap();
        assert_eq!(task.normalized_status(), Status::Ready);
    }

    #[tokio::test]
    async fn test_claim_task_checks() {
        let (engine, _) = engine_with(
            vec![Task::new("a", "A"), Task::new("b", "B"), with_status("c", "done")],
            vec![DependencyEdge::blocks("b", "a")],
        )
        .await;

        assert!(matches!(
            engine.claim_task("zzz", "agent-1").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            engine.claim_task("b", "agent-1").await,
            Err(Error::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            engine.claim_task("c", "agent-1").await,
            Err(Error::InvalidStateTransition { .. })
        ));

        let task = engine.claim_task("a", "agent-1").await.unwrap();
        assert_eq!(task.assignee.as_deref(), Some("agent-1"));
        assert!(matches!(
            engine.claim_task("a", "agent-2").await,
            Err(Error::InvalidStateTransition { .. })
        ));
    }
}

//! Beads `issues.jsonl` store.
//!
//! Each line holds one issue with its outgoing dependencies embedded:
//!
//! ```text
//! {"id":"padai-5","title":"...","status":"open","dependencies":[{"depends_on_id":"padai-4","type":"blocks"}]}
//! ```
//!
//! Lines that fail to parse are skipped with a warning when loading and are
//! carried through unchanged when the file is rewritten. Fields the engine
//! does not model are preserved as well.
//!
//! Cross-process exclusion uses an advisory lock on a sibling
//! `issues.jsonl.lock` file, so separate `padai` processes pointed at one
//! file serialize their read-check-write cycles.

use async_trait::async_trait;
use fs2::FileExt;
use padai_core::{DependencyEdge, Error, Result, Task};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::store::{StoreContents, StoreLock, TaskStore};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One line of the JSONL file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IssueRecord {
    #[serde(flatten)]
    task: Task,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<DependencyEdge>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl IssueRecord {
    fn edges(&self) -> impl Iterator<Item = DependencyEdge> + '_ {
        self.dependencies.iter().map(|dep| {
            let mut edge = dep.clone();
            if edge.issue_id.is_empty() {
                edge.issue_id = self.task.id.clone();
            }
            edge
        })
    }
}

enum Line {
    Issue(Box<IssueRecord>),
    Raw(String),
}

/// Advisory lock on the store's `.lock` file, released on drop.
struct FileLock {
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    /// Blocks until the exclusive lock is held.
    fn acquire(lock_path: PathBuf) -> Result<Self> {
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        debug!("Acquired store lock {}", lock_path.display());

        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // The lock file stays on disk; removing it would let a waiter lock an
        // unlinked inode.
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release store lock {}: {}", self.lock_path.display(), e);
        }
    }
}

/// Task store backed by a single beads JSONL file.
pub struct JsonlStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the JSONL file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the sibling file used for cross-process locking.
    pub fn lock_path(&self) -> PathBuf {
        self.path.with_extension("jsonl.lock")
    }

    async fn read_lines(&self) -> Result<Vec<Line>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Store file {} does not exist, treating as empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut lines = Vec::new();
        for (idx, raw) in content.lines().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            match parse_record(raw) {
                Ok(record) => lines.push(Line::Issue(Box::new(record))),
                Err(e) => {
                    warn!(
                        "Skipping invalid record at {}:{}: {}",
                        self.path.display(),
                        idx + 1,
                        e
                    );
                    lines.push(Line::Raw(raw.to_string()));
                }
            }
        }
        Ok(lines)
    }

    async fn write_lines(&self, lines: &[Line]) -> Result<()> {
        let mut out = String::new();
        for line in lines {
            match line {
                Line::Issue(record) => out.push_str(&serde_json::to_string(record)?),
                Line::Raw(raw) => out.push_str(raw),
            }
            out.push('\n');
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Write beside the target and rename so readers never see a torn file.
        let tmp = self.path.with_extension(format!(
            "jsonl.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, out).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn parse_record(raw: &str) -> Result<IssueRecord> {
    let record: IssueRecord = serde_json::from_str(raw)?;
    record.task.validate()?;
    Ok(record)
}

#[async_trait]
impl TaskStore for JsonlStore {
    async fn load_all_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.load_all().await?.tasks)
    }

    async fn load_all_edges(&self) -> Result<Vec<DependencyEdge>> {
        Ok(self.load_all().await?.edges)
    }

    async fn load_all(&self) -> Result<StoreContents> {
        let mut contents = StoreContents::default();
        for line in self.read_lines().await? {
            if let Line::Issue(record) = line {
                contents.edges.extend(record.edges());
                contents.tasks.push(record.task);
            }
        }
        debug!(
            "Loaded {} tasks and {} edges from {}",
            contents.tasks.len(),
            contents.edges.len(),
            self.path.display()
        );
        Ok(contents)
    }

    async fn persist_task(&self, task: &Task) -> Result<()> {
        task.validate()?;
        let _guard = self.write_lock.lock().await;

        let mut lines = self.read_lines().await?;
        // Duplicate records of one id all take the new state, so whichever
        // one a reader keeps agrees with what was written.
        let mut matched = 0;
        for line in lines.iter_mut() {
            if let Line::Issue(record) = line {
                if record.task.id == task.id {
                    record.task = task.clone();
                    matched += 1;
                }
            }
        }
        if matched > 1 {
            warn!("Task {} has {} records in {}", task.id, matched, self.path.display());
        }

        if matched == 0 {
            lines.push(Line::Issue(Box::new(IssueRecord {
                task: task.clone(),
                dependencies: Vec::new(),
                extra: serde_json::Map::new(),
            })));
        }

        debug!("Persisting task {} to {}", task.id, self.path.display());
        self.write_lines(&lines).await
    }

    async fn lock(&self) -> Result<StoreLock> {
        let lock_path = self.lock_path();
        let lock = tokio::task::spawn_blocking(move || FileLock::acquire(lock_path))
            .await
            .map_err(|e| Error::Store(format!("store lock task failed: {}", e)))??;
        Ok(StoreLock::new(lock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use padai_core::DependencyType;
    use std::time::Duration;
    use tempfile::TempDir;

    const SAMPLE: &str = concat!(
        r#"{"id":"padai-1","title":"Setup","status":"closed","priority":1,"created_at":"2025-10-14T09:00:00Z","updated_at":"2025-10-14T09:00:00Z"}"#,
        "\n",
        r#"{"id":"padai-2","title":"API","status":"open","priority":1,"created_at":"2025-10-14T09:01:00Z","updated_at":"2025-10-14T09:01:00Z","design":"keep me","dependencies":[{"issue_id":"padai-2","depends_on_id":"padai-1","type":"blocks"},{"depends_on_id":"padai-9","type":"related"}]}"#,
        "\n",
        "not json at all\n",
        "\n",
    );

    fn sample_store(dir: &TempDir) -> JsonlStore {
        let path = dir.path().join(".beads/issues.jsonl");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, SAMPLE).unwrap();
        JsonlStore::new(path)
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path().join("nope.jsonl"));
        let contents = store.load_all().await.unwrap();
        assert!(contents.tasks.is_empty());
        assert!(contents.edges.is_empty());
    }

    #[tokio::test]
    async fn test_load_skips_bad_lines_and_fills_issue_id() {
        let dir = TempDir::new().unwrap();
        let store = sample_store(&dir);

        let tasks = store.load_all_tasks().await.unwrap();
        assert_eq!(tasks.len(), 2);

        let edges = store.load_all_edges().await.unwrap();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.issue_id == "padai-2"));
        assert_eq!(edges[1].dep_type, DependencyType::Related);
    }

    #[tokio::test]
    async fn test_persist_preserves_dependencies_and_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let store = sample_store(&dir);

        let mut task = store
            .load_all_tasks()
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.id == "padai-2")
            .unwrap();
        task.status = "in_progress".to_string();
        task.assignee = Some("agent-1".to_string());
        store.persist_task(&task).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("not json at all"));
        assert!(raw.contains(r#""design":"keep me""#));

        let contents = store.load_all().await.unwrap();
        let reloaded = contents.tasks.iter().find(|t| t.id == "padai-2").unwrap();
        assert_eq!(reloaded.status, "in_progress");
        assert_eq!(reloaded.assignee.as_deref(), Some("agent-1"));
        assert_eq!(contents.edges.len(), 2);
    }

    #[tokio::test]
    async fn test_persist_appends_new_task() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path().join("fresh/issues.jsonl"));

        store.persist_task(&Task::new("t1", "First")).await.unwrap();
        store.persist_task(&Task::new("t2", "Second")).await.unwrap();

        let tasks = store.load_all_tasks().await.unwrap();
        let ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_persist_rewrites_every_duplicate_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("issues.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"id":"dup","title":"Old","status":"open","created_at":"2025-10-14T09:00:00Z","updated_at":"2025-10-14T09:00:00Z"}"#,
                "\n",
                r#"{"id":"other","title":"Other","status":"open","created_at":"2025-10-14T09:00:00Z","updated_at":"2025-10-14T09:00:00Z"}"#,
                "\n",
                r#"{"id":"dup","title":"Newer","status":"open","created_at":"2025-10-14T09:00:00Z","updated_at":"2025-10-14T09:00:00Z","dependencies":[{"depends_on_id":"other","type":"blocks"}]}"#,
                "\n",
            ),
        )
        .unwrap();
        let store = JsonlStore::new(&path);

        let mut task = Task::new("dup", "Newer");
        task.status = "in_progress".to_string();
        task.assignee = Some("agent-1".to_string());
        store.persist_task(&task).await.unwrap();

        let contents = store.load_all().await.unwrap();
        assert_eq!(contents.tasks.len(), 3);
        let copies: Vec<_> = contents.tasks.iter().filter(|t| t.id == "dup").collect();
        assert_eq!(copies.len(), 2);
        assert!(copies
            .iter()
            .all(|t| t.status == "in_progress" && t.assignee.as_deref() == Some("agent-1")));
        // the second record keeps its embedded dependency
        assert_eq!(contents.edges.len(), 1);
        assert_eq!(contents.edges[0].issue_id, "dup");
    }

    #[tokio::test]
    async fn test_persist_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path().join("issues.jsonl"));

        store.persist_task(&Task::new("t1", "First")).await.unwrap();
        store.persist_task(&Task::new("t2", "Second")).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["issues.jsonl"]);
    }

    #[tokio::test]
    async fn test_lock_excludes_other_handles_on_same_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".beads/issues.jsonl");
        let store = JsonlStore::new(&path);
        let other = JsonlStore::new(&path);

        let held = store.lock().await.unwrap();
        assert!(store.lock_path().exists());

        let waiter = tokio::spawn(async move { other.lock().await.map(|_| ()) });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_persist_rejects_invalid_task() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path().join("issues.jsonl"));
        assert!(store.persist_task(&Task::new("", "x")).await.is_err());
    }
}

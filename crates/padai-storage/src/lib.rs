//! PadAI Storage - durable task stores
//!
//! This crate defines the [`TaskStore`] port the coordination engine reads
//! and writes through, plus two implementations:
//!
//! - [`JsonlStore`]: a beads `issues.jsonl` file, one issue per line with its
//!   dependencies embedded
//! - [`InMemoryStore`]: process-local state, used by tests and embedders
//!
//! # Example Usage
//!
//! ```no_run
//! use padai_storage::{JsonlStore, TaskStore};
//!
//! # async fn example() -> padai_core::Result<()> {
//! let store = JsonlStore::new(".beads/issues.jsonl");
//! let contents = store.load_all().await?;
//! println!("{} tasks, {} edges", contents.tasks.len(), contents.edges.len());
//! # Ok(())
//! # }
//! ```

pub mod jsonl;
pub mod memory;
pub mod store;

pub use jsonl::JsonlStore;
pub use memory::InMemoryStore;
pub use store::{StoreContents, StoreLock, TaskStore};

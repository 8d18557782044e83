//! PadAI Engine - dependency-aware task coordination
//!
//! Many worker agents share one graph of tasks linked by `blocks` edges. The
//! engine answers readiness and dependency-closure queries and hands out
//! work with at most one assignee per task.
//!
//! # Architecture
//!
//! ```text
//! TaskStore ──load──▶ TaskGraph ──▶ Snapshot (Arc, published)
//!                                     │  list_ready / get_blocking / list_all
//!                                     ▼
//!                         Engine writer section
//!                     claim / complete / abandon / reload
//!                                     │
//! TaskStore ◀──persist────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use padai_core::EngineConfig;
//! use padai_engine::Engine;
//! use padai_storage::JsonlStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> padai_core::Result<()> {
//! let store = Arc::new(JsonlStore::new(".beads/issues.jsonl"));
//! let engine = Engine::open(store, EngineConfig::default()).await?;
//!
//! match engine.claim("agent-1").await {
//!     Ok(task) => println!("working on {}", task.id),
//!     Err(e) if e.is_no_tasks() => println!("nothing ready"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod coordinator;
pub mod graph;
pub mod policy;
pub mod readiness;
pub mod snapshot;

pub use coordinator::{Engine, LoadReport};
pub use graph::{GraphAnomaly, TaskGraph};
pub use policy::{ClaimPolicy, FirstReady};
pub use snapshot::Snapshot;

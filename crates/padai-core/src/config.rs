//! Configuration for the coordination engine.
//!
//! Loaded from `.padai/config.toml` in the workspace root; every field has a
//! default so a missing file or a partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Relative location of the config file inside a workspace.
pub const CONFIG_FILE: &str = ".padai/config.toml";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path of the beads `issues.jsonl` file, relative to the workspace root
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Refuse to load a graph with dangling edges or self-loops
    #[serde(default)]
    pub strict_graph: bool,

    /// Conflicts `claim` tolerates before giving up with `ConcurrencyExhausted`
    #[serde(default = "default_max_claim_conflicts")]
    pub max_claim_conflicts: usize,

    /// Which end of the priority scale is claimed first
    #[serde(default)]
    pub priority_order: PriorityOrder,
}

/// Direction of the priority comparison in ready ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityOrder {
    /// Larger priority values are claimed first.
    #[default]
    HigherFirst,
    /// Smaller values are claimed first (beads P0 = critical).
    LowerFirst,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".beads/issues.jsonl")
}

fn default_max_claim_conflicts() -> usize {
    3
}

impl EngineConfig {
    /// Load configuration from `.padai/config.toml` or use defaults
    pub fn load_or_default(workspace_root: &Path) -> Result<Self> {
        let config_path = workspace_root.join(CONFIG_FILE);

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from an explicit file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write default configuration to `.padai/config.toml`
    pub fn write_default(workspace_root: &Path) -> Result<()> {
        let config_path = workspace_root.join(CONFIG_FILE);
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Reject settings the engine cannot run with: a zero conflict budget or
    /// an empty store path.
    pub fn validate(&self) -> Result<()> {
        if self.max_claim_conflicts == 0 {
            return Err(Error::Config(
                "max_claim_conflicts must be at least 1".to_string(),
            ));
        }
        if self.store_path.as_os_str().is_empty() {
            return Err(Error::Config("store_path must not be empty".to_string()));
        }
        Ok(())
    }

    /// Store path resolved against the workspace root.
    pub fn resolved_store_path(&self, workspace_root: &Path) -> PathBuf {
        if self.store_path.is_absolute() {
            self.store_path.clone()
        } else {
            workspace_root.join(&self.store_path)
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            strict_graph: false,
            max_claim_conflicts: default_max_claim_conflicts(),
            priority_order: PriorityOrder::default(),
        }
    }
}

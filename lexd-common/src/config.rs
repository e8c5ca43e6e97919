//! Static range-metadata fallback configuration
//!
//! Some ranges exist only by external convention and are never stored in the
//! canonical document. This module loads the file that declares them, keyed
//! by range id. The file is read once at process start and can be reloaded
//! on demand.
//!
//! File format (TOML):
//!
//! ```toml
//! [ranges.grammatical-info]
//! label = "Grammatical Category"
//! description = "Part-of-speech inventory used by sense analyses"
//! type = "fieldworks"
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{info, warn};

/// Declared origin of a config-provided range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeConfigKind {
    /// A FieldWorks-defined taxonomy
    Fieldworks,
    /// A project-defined vocabulary
    Custom,
}

/// Fallback metadata for one range id
#[derive(Debug, Clone, Deserialize)]
pub struct RangeConfigEntry {
    /// Human-readable range label
    pub label: String,
    /// Optional longer description
    #[serde(default)]
    pub description: Option<String>,
    /// Declared range origin
    #[serde(rename = "type")]
    pub kind: RangeConfigKind,
}

#[derive(Debug, Deserialize)]
struct RangeConfigFile {
    #[serde(default)]
    ranges: BTreeMap<String, RangeConfigEntry>,
}

/// Loaded range-metadata fallback, reloadable on demand.
///
/// A missing file degrades to an empty config with a logged warning; fallback
/// metadata is optional in a fully-canonical environment.
#[derive(Debug)]
pub struct RangeConfig {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, RangeConfigEntry>>,
}

impl RangeConfig {
    /// Load the config file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let entries = read_entries(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries: RwLock::new(entries),
        })
    }

    /// Build a config directly from entries (no backing file)
    pub fn from_entries(entries: BTreeMap<String, RangeConfigEntry>) -> Self {
        Self {
            path: None,
            entries: RwLock::new(entries),
        }
    }

    /// Empty config (no fallback ranges declared)
    pub fn empty() -> Self {
        Self::from_entries(BTreeMap::new())
    }

    /// Re-read the backing file, replacing the in-memory entries.
    ///
    /// No-op for configs built without a file.
    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let entries = read_entries(path)?;
        info!(
            path = %path.display(),
            count = entries.len(),
            "Reloaded range config"
        );
        *self.entries.write().unwrap() = entries;
        Ok(())
    }

    /// Look up the fallback metadata for one range id
    pub fn get(&self, range_id: &str) -> Option<RangeConfigEntry> {
        self.entries.read().unwrap().get(range_id).cloned()
    }

    /// Snapshot of all declared entries
    pub fn entries(&self) -> BTreeMap<String, RangeConfigEntry> {
        self.entries.read().unwrap().clone()
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, RangeConfigEntry>> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Range config file not found; continuing without fallback ranges"
        );
        return Ok(BTreeMap::new());
    }

    let content = std::fs::read_to_string(path)?;
    let parsed: RangeConfigFile = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid range config {}: {}", path.display(), e)))?;

    Ok(parsed.ranges)
}

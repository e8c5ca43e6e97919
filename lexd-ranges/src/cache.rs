//! Merged-ranges cache
//!
//! Process-wide cache of the merged range view, keyed by project id.
//! Populated lazily on first read; every mutating call invalidates its
//! project explicitly. No TTL, no background refresh.

use crate::model::Range;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::debug;

/// Explicit cache object; the dependency direction is mutation -> cache only.
#[derive(Debug, Default)]
pub struct RangeCache {
    inner: RwLock<HashMap<String, BTreeMap<String, Range>>>,
}

impl RangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached merged view for a project, if any
    pub fn get(&self, project_id: &str) -> Option<BTreeMap<String, Range>> {
        self.inner.read().unwrap().get(project_id).cloned()
    }

    /// Store the merged view for a project
    pub fn put(&self, project_id: &str, ranges: BTreeMap<String, Range>) {
        self.inner
            .write()
            .unwrap()
            .insert(project_id.to_string(), ranges);
    }

    /// Drop the cached view for one project
    pub fn invalidate(&self, project_id: &str) {
        if self.inner.write().unwrap().remove(project_id).is_some() {
            debug!(project_id, "Invalidated ranges cache");
        }
    }

    /// Drop all cached views
    pub fn clear(&self) {
        self.inner.write().unwrap().clear();
    }
}

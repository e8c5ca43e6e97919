//! Range reconciliation engine
//!
//! Merges three differently-shaped sources into one queryable view:
//! canonical ranges from the document store, project-specific custom
//! elements from the relational store, and static config fallback entries.
//! Precedence is canonical > custom-additive > config-fallback, expressed as
//! a pure function over immutable snapshots. The merged view is cached per
//! project and invalidated explicitly by every mutation.

use crate::cache::RangeCache;
use crate::codec;
use crate::known;
use crate::model::{preferred_text, Range, RangeElement};
use crate::resolver;
use crate::store::{self, queries, CanonicalStore};
use lexd_common::config::{RangeConfig, RangeConfigEntry, RangeConfigKind};
use lexd_common::db::{load_custom_ranges, CustomRange};
use lexd_common::{guid, Error, Result};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Read side of the ranges engine
pub struct RangeReconciler {
    store: Arc<dyn CanonicalStore>,
    db: SqlitePool,
    config: Arc<RangeConfig>,
    cache: Arc<RangeCache>,
}

impl RangeReconciler {
    pub fn new(
        store: Arc<dyn CanonicalStore>,
        db: SqlitePool,
        config: Arc<RangeConfig>,
        cache: Arc<RangeCache>,
    ) -> Self {
        Self {
            store,
            db,
            config,
            cache,
        }
    }

    /// The merged range view for a project, cached after the first read.
    ///
    /// A fully empty environment (no canonical document, no custom rows, no
    /// config entries) yields an empty map rather than a fabricated default.
    pub async fn get_all_ranges(&self, project_id: &str) -> Result<BTreeMap<String, Range>> {
        if let Some(cached) = self.cache.get(project_id) {
            return Ok(cached);
        }

        let canonical = self.fetch_canonical_ranges().await?;
        let custom = load_custom_ranges(&self.db, project_id).await?;
        let config = self.config.entries();

        let merged = dedupe_aliases(merge_sources(canonical, &custom, &config));
        debug!(
            project_id,
            ranges = merged.len(),
            "Built merged ranges view"
        );

        self.cache.put(project_id, merged.clone());
        Ok(merged)
    }

    /// One range from the merged view.
    ///
    /// A range materialized purely from config fallback and still empty gets
    /// one targeted canonical query (elements may have been added since the
    /// aggregate snapshot); a range absent from the merged view entirely gets
    /// a targeted query before `NotFound` is raised. Resolution always
    /// operates on a copy, never on the cached value.
    pub async fn get_range(
        &self,
        range_id: &str,
        project_id: &str,
        resolved: bool,
    ) -> Result<Range> {
        let all = self.get_all_ranges(project_id).await?;

        if let Some(cached) = all.get(range_id) {
            let mut range = cached.clone();
            if range.elements.is_empty() && range.provided_by_config {
                if let Some(found) = store::fetch_range(self.store.as_ref(), range_id).await? {
                    range.elements = found.elements;
                    if range.guid.is_empty() {
                        range.guid = found.guid;
                    }
                }
            }
            return Ok(finish(range, resolved));
        }

        match store::fetch_range(self.store.as_ref(), range_id).await? {
            Some(mut found) => {
                found.standard = known::is_standard(&found.id);
                Ok(finish(found, resolved))
            }
            None => Err(Error::NotFound(format!("Range '{}' not found", range_id))),
        }
    }

    async fn fetch_canonical_ranges(&self) -> Result<Vec<Range>> {
        let text = self
            .store
            .execute_query(&queries::all_ranges(self.store.database()))
            .await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        match codec::decode_ranges(&text) {
            Ok(ranges) => Ok(ranges),
            Err(e) => {
                warn!(
                    error = %e,
                    "Malformed canonical ranges document; continuing without canonical ranges"
                );
                Ok(Vec::new())
            }
        }
    }
}

fn finish(mut range: Range, resolved: bool) -> Range {
    if resolved {
        range.elements = resolver::resolve_elements(&range.elements);
    }
    range
}

fn config_kind_str(kind: RangeConfigKind) -> &'static str {
    match kind {
        RangeConfigKind::Fieldworks => "fieldworks",
        RangeConfigKind::Custom => "custom",
    }
}

/// Merge the three source snapshots into a fresh map.
///
/// Canonical ranges are carried over untouched, custom elements are strictly
/// additive, and config entries only materialize ranges absent from both
/// other sources.
fn merge_sources(
    canonical: Vec<Range>,
    custom: &[CustomRange],
    config: &BTreeMap<String, RangeConfigEntry>,
) -> BTreeMap<String, Range> {
    let mut merged: BTreeMap<String, Range> = BTreeMap::new();

    for mut range in canonical {
        if range.id.is_empty() {
            warn!("Skipping canonical range without id");
            continue;
        }
        range.standard = known::is_standard(&range.id);
        if let Some(entry) = config.get(&range.id) {
            // Canonical data is authoritative: record the declared type but
            // never flag a canonical range as config-provided.
            range.config_type = Some(config_kind_str(entry.kind).to_string());
            if preferred_text(&range.label).is_none() {
                range.label.insert("en".to_string(), entry.label.clone());
            }
            if range.description.is_empty() {
                if let Some(desc) = &entry.description {
                    range.description.insert("en".to_string(), desc.clone());
                }
            }
        }
        merged.insert(range.id.clone(), range);
    }

    let mut groups: BTreeMap<&str, Vec<&CustomRange>> = BTreeMap::new();
    for row in custom {
        groups.entry(row.range_name.as_str()).or_default().push(row);
    }
    for (name, rows) in groups {
        let range = merged.entry(name.to_string()).or_insert_with(|| {
            let mut container = Range {
                id: name.to_string(),
                guid: guid::new_guid(),
                official: false,
                standard: known::is_standard(name),
                ..Default::default()
            };
            if let Some(entry) = config.get(name) {
                container.config_type = Some(config_kind_str(entry.kind).to_string());
                container
                    .label
                    .insert("en".to_string(), entry.label.clone());
            }
            container
        });
        for row in rows {
            if range.contains_element(&row.element_id) {
                // Canonical elements are never altered by the merge step
                continue;
            }
            range.elements.push(element_from_custom(row));
        }
    }

    for (id, entry) in config {
        if merged.contains_key(id) {
            continue;
        }
        let mut range = Range {
            id: id.clone(),
            guid: guid::new_guid(),
            official: false,
            standard: known::is_standard(id),
            provided_by_config: true,
            fieldworks_standard: entry.kind == RangeConfigKind::Fieldworks,
            config_type: Some(config_kind_str(entry.kind).to_string()),
            ..Default::default()
        };
        range.label.insert("en".to_string(), entry.label.clone());
        if let Some(desc) = &entry.description {
            range.description.insert("en".to_string(), desc.clone());
        }
        merged.insert(id.clone(), range);
    }

    merged
}

fn element_from_custom(row: &CustomRange) -> RangeElement {
    let mut el = RangeElement {
        id: row.element_id.clone(),
        guid: guid::new_guid(),
        custom: true,
        ..Default::default()
    };
    if let Some(label) = &row.element_label {
        el.label.insert("en".to_string(), label.clone());
    }
    if let Some(desc) = &row.element_description {
        el.description.insert("en".to_string(), desc.clone());
    }
    for value in &row.values {
        let mut child = RangeElement {
            id: value.value.clone(),
            guid: guid::new_guid(),
            value: Some(value.value.clone()),
            parent_id: Some(row.element_id.clone()),
            custom: true,
            ..Default::default()
        };
        if let Some(label) = &value.label {
            child.label.insert("en".to_string(), label.clone());
        }
        if let Some(desc) = &value.description {
            child.description.insert("en".to_string(), desc.clone());
        }
        el.children.push(child);
    }
    el
}

/// Collapse known singular/plural alias spellings to one key.
///
/// The surviving key is the alias that already carried more elements; the
/// other alias's elements are unioned in by id.
fn dedupe_aliases(mut merged: BTreeMap<String, Range>) -> BTreeMap<String, Range> {
    for (primary, alt) in known::RANGE_ID_ALIASES {
        if !(merged.contains_key(*primary) && merged.contains_key(*alt)) {
            continue;
        }
        let a = merged.remove(*primary).expect("checked above");
        let b = merged.remove(*alt).expect("checked above");
        let (mut survivor, loser) = if b.element_ids().len() > a.element_ids().len() {
            (b, a)
        } else {
            (a, b)
        };

        survivor.official |= loser.official;
        survivor.standard |= loser.standard;
        survivor.provided_by_config &= loser.provided_by_config;
        survivor.fieldworks_standard = if survivor.official {
            false
        } else {
            survivor.fieldworks_standard || loser.fieldworks_standard
        };
        if survivor.config_type.is_none() {
            survivor.config_type = loser.config_type.clone();
        }
        if survivor.label.is_empty() {
            survivor.label = loser.label.clone();
        }
        if survivor.description.is_empty() {
            survivor.description = loser.description.clone();
        }
        for el in loser.elements {
            if !survivor.contains_element(&el.id) {
                survivor.elements.push(el);
            }
        }

        debug!(survivor = %survivor.id, "Collapsed range alias pair");
        merged.insert(survivor.id.clone(), survivor);
    }
    merged
}

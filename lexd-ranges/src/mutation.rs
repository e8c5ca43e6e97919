//! Mutation/CRUD engine for canonical ranges
//!
//! Entity lifecycle is `absent -> created -> updated* -> deleted`; an update
//! is always a delete plus reinsert of the canonical node, never an in-place
//! patch. Uniqueness is check-then-act: validation reads in one round-trip,
//! the write follows in a second, and true mutual exclusion belongs to the
//! underlying store. Every mutating call invalidates the merged-ranges
//! cache for its project, and deletions of in-use values route through the
//! usage engine first.

use crate::cache::RangeCache;
use crate::codec;
use crate::known;
use crate::model::{Range, RangeElement};
use crate::store::{self, queries, CanonicalStore};
use crate::usage::{MigrationOp, UsageScanner};
use lexd_common::db::delete_custom_ranges;
use lexd_common::{Error, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Payload for range create/update calls
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RangeData {
    pub id: Option<String>,
    pub label: BTreeMap<String, String>,
    pub description: BTreeMap<String, String>,
    /// Element forest; an update without elements keeps the current forest
    #[serde(rename = "values")]
    pub elements: Option<Vec<RangeElement>>,
}

/// Payload for element create/update calls
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RangeElementData {
    pub id: Option<String>,
    pub value: Option<String>,
    pub label: BTreeMap<String, String>,
    pub description: BTreeMap<String, String>,
    pub abbreviation: BTreeMap<String, String>,
    pub parent_id: Option<String>,
    pub traits: BTreeMap<String, String>,
}

/// Migration choice accompanying a guarded deletion
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeMigration {
    pub operation: MigrationOp,
    #[serde(default)]
    pub new_value: Option<String>,
}

/// Write side of the ranges engine
pub struct RangeMutator {
    store: Arc<dyn CanonicalStore>,
    db: SqlitePool,
    cache: Arc<RangeCache>,
    usage: UsageScanner,
}

impl RangeMutator {
    pub fn new(store: Arc<dyn CanonicalStore>, db: SqlitePool, cache: Arc<RangeCache>) -> Self {
        let usage = UsageScanner::new(store.clone());
        Self {
            store,
            db,
            cache,
            usage,
        }
    }

    /// Create a new canonical range. The id must not exist yet.
    pub async fn create_range(&self, project_id: &str, data: RangeData) -> Result<Range> {
        let id = required_id(data.id.as_deref(), "Range id is required")?;

        if store::fetch_range(self.store.as_ref(), &id).await?.is_some() {
            return Err(Error::Validation(format!(
                "Range '{}' already exists",
                id
            )));
        }

        let mut elements = data.elements.unwrap_or_default();
        check_unique_ids(&elements)?;
        ensure_guids(&mut elements);

        let range = Range {
            id: id.clone(),
            guid: Uuid::new_v4().to_string(),
            label: data.label,
            description: data.description,
            elements,
            official: true,
            standard: known::is_standard(&id),
            ..Default::default()
        };

        let query = queries::insert_range(self.store.database(), &codec::encode_range(&range));
        self.store.execute_update(&query).await?;
        self.cache.invalidate(project_id);

        info!(range_id = %id, "Created range");
        Ok(range)
    }

    /// Replace an existing canonical range node.
    ///
    /// Elements supplied in `data` are preserved in the reinserted node;
    /// with no supplied elements the current forest is kept.
    pub async fn update_range(
        &self,
        project_id: &str,
        range_id: &str,
        data: RangeData,
    ) -> Result<Range> {
        let existing = self.fetch_existing_range(range_id).await?;

        let mut elements = match data.elements {
            Some(elements) => elements,
            None => existing.elements.clone(),
        };
        check_unique_ids(&elements)?;
        ensure_guids(&mut elements);

        let range = Range {
            id: range_id.to_string(),
            guid: keep_or_generate(&existing.guid),
            label: if data.label.is_empty() {
                existing.label.clone()
            } else {
                data.label
            },
            description: if data.description.is_empty() {
                existing.description.clone()
            } else {
                data.description
            },
            elements,
            official: true,
            standard: known::is_standard(range_id),
            ..Default::default()
        };

        let query = queries::replace_range(
            self.store.database(),
            range_id,
            &codec::encode_range(&range),
        );
        self.store.execute_update(&query).await?;
        self.cache.invalidate(project_id);

        info!(range_id, "Updated range");
        Ok(range)
    }

    /// Delete a canonical range and its custom rows.
    ///
    /// With referencing records and no migration this fails with the
    /// reference count; a supplied migration runs first, per used value.
    /// Custom-row deletion is best-effort and never fails the call.
    pub async fn delete_range(
        &self,
        project_id: &str,
        range_id: &str,
        migration: Option<&RangeMigration>,
    ) -> Result<()> {
        self.fetch_existing_range(range_id).await?;
        validate_migration(migration)?;

        let usage = self.usage.find_range_usage(range_id, None).await?;
        if !usage.is_empty() {
            let Some(migration) = migration else {
                return Err(Error::Validation(format!(
                    "Range '{}' is referenced by {} records; supply a migration to delete it",
                    range_id,
                    usage.len()
                )));
            };
            let summary = self.usage.get_usage_by_element(range_id).await?;
            for value in summary.elements.keys() {
                self.usage
                    .migrate_range_values(
                        range_id,
                        value,
                        migration.operation,
                        migration.new_value.as_deref(),
                        false,
                    )
                    .await?;
            }
        }

        let query = queries::delete_range(self.store.database(), range_id);
        self.store.execute_update(&query).await?;

        if let Err(e) = delete_custom_ranges(&self.db, project_id, range_id).await {
            warn!(range_id, error = %e, "Failed to delete custom rows for range");
        }

        self.cache.invalidate(project_id);
        info!(range_id, "Deleted range");
        Ok(())
    }

    /// Create a new element in a range.
    ///
    /// The element id must be unique across the range's entire hierarchy,
    /// and a supplied parent must exist without introducing a cycle.
    pub async fn create_range_element(
        &self,
        project_id: &str,
        range_id: &str,
        data: RangeElementData,
    ) -> Result<RangeElement> {
        let range = self.fetch_existing_range(range_id).await?;
        let id = required_id(data.id.as_deref(), "Element id is required")?;

        if range.contains_element(&id) {
            return Err(Error::Validation(format!(
                "Element '{}' already exists in range '{}'",
                id, range_id
            )));
        }
        if let Some(parent_id) = &data.parent_id {
            validate_parent_reference(&range, &id, parent_id)?;
        }

        let element = RangeElement {
            id: id.clone(),
            guid: Uuid::new_v4().to_string(),
            value: data.value,
            label: data.label,
            description: data.description,
            abbreviation: data.abbreviation,
            parent_id: data.parent_id,
            traits: data.traits,
            ..Default::default()
        };

        let query = queries::insert_element(
            self.store.database(),
            range_id,
            &codec::encode_element(&element),
        );
        self.store.execute_update(&query).await?;
        self.cache.invalidate(project_id);

        info!(range_id, element_id = %id, "Created range element");
        Ok(element)
    }

    /// Replace an existing element node, keeping its guid and children.
    pub async fn update_range_element(
        &self,
        project_id: &str,
        range_id: &str,
        element_id: &str,
        data: RangeElementData,
    ) -> Result<RangeElement> {
        let range = self.fetch_existing_range(range_id).await?;
        let existing = range.find_element(element_id).cloned().ok_or_else(|| {
            Error::NotFound(format!(
                "Element '{}' not found in range '{}'",
                element_id, range_id
            ))
        })?;

        if let Some(new_id) = data.id.as_deref().filter(|s| !s.is_empty()) {
            if new_id != element_id {
                return Err(Error::Validation(
                    "Element id cannot be changed by an update".to_string(),
                ));
            }
        }
        if let Some(parent_id) = &data.parent_id {
            validate_parent_reference(&range, element_id, parent_id)?;
        }

        let element = RangeElement {
            id: element_id.to_string(),
            guid: keep_or_generate(&existing.guid),
            value: data.value.or(existing.value),
            label: if data.label.is_empty() {
                existing.label
            } else {
                data.label
            },
            description: if data.description.is_empty() {
                existing.description
            } else {
                data.description
            },
            abbreviation: if data.abbreviation.is_empty() {
                existing.abbreviation
            } else {
                data.abbreviation
            },
            parent_id: data.parent_id.or(existing.parent_id),
            children: existing.children,
            traits: if data.traits.is_empty() {
                existing.traits
            } else {
                data.traits
            },
            custom: existing.custom,
            ..Default::default()
        };

        let query = queries::replace_element(
            self.store.database(),
            range_id,
            element_id,
            &codec::encode_element(&element),
        );
        self.store.execute_update(&query).await?;
        self.cache.invalidate(project_id);

        info!(range_id, element_id, "Updated range element");
        Ok(element)
    }

    /// Delete one element, usage-guarded on that element's value.
    pub async fn delete_range_element(
        &self,
        project_id: &str,
        range_id: &str,
        element_id: &str,
        migration: Option<&RangeMigration>,
    ) -> Result<()> {
        let range = self.fetch_existing_range(range_id).await?;
        let element = range.find_element(element_id).ok_or_else(|| {
            Error::NotFound(format!(
                "Element '{}' not found in range '{}'",
                element_id, range_id
            ))
        })?;
        validate_migration(migration)?;

        let value = element.reference_value().to_string();
        let usage = self.usage.find_range_usage(range_id, Some(&value)).await?;
        if !usage.is_empty() {
            let Some(migration) = migration else {
                return Err(Error::Validation(format!(
                    "Element '{}' of range '{}' is referenced by {} records; \
                     supply a migration to delete it",
                    element_id,
                    range_id,
                    usage.len()
                )));
            };
            self.usage
                .migrate_range_values(
                    range_id,
                    &value,
                    migration.operation,
                    migration.new_value.as_deref(),
                    false,
                )
                .await?;
        }

        let query = queries::delete_element(self.store.database(), range_id, element_id);
        self.store.execute_update(&query).await?;
        self.cache.invalidate(project_id);

        info!(range_id, element_id, "Deleted range element");
        Ok(())
    }

    async fn fetch_existing_range(&self, range_id: &str) -> Result<Range> {
        store::fetch_range(self.store.as_ref(), range_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Range '{}' not found", range_id)))
    }
}

/// Reject a parent reference that is missing or would make `element_id` its
/// own ancestor.
///
/// Walks the parent chain upward from the proposed parent, tracking visited
/// ids so already-corrupt data cannot loop forever; cost is proportional to
/// the walked depth.
pub fn validate_parent_reference(
    range: &Range,
    element_id: &str,
    proposed_parent_id: &str,
) -> Result<()> {
    if !range.contains_element(proposed_parent_id) {
        return Err(Error::Validation(format!(
            "Parent element '{}' not found in range '{}'",
            proposed_parent_id, range.id
        )));
    }

    let parents = range.parent_map();
    let mut visited = HashSet::new();
    let mut current = Some(proposed_parent_id.to_string());
    while let Some(id) = current {
        if id == element_id {
            return Err(Error::Validation(format!(
                "Circular parent reference: '{}' would become its own ancestor",
                element_id
            )));
        }
        if !visited.insert(id.clone()) {
            break;
        }
        current = parents.get(&id).cloned().flatten();
    }
    Ok(())
}

fn required_id(id: Option<&str>, message: &str) -> Result<String> {
    id.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| Error::Validation(message.to_string()))
}

fn keep_or_generate(guid: &str) -> String {
    if guid.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        guid.to_string()
    }
}

fn validate_migration(migration: Option<&RangeMigration>) -> Result<()> {
    if let Some(migration) = migration {
        if migration.operation == MigrationOp::Replace
            && migration
                .new_value
                .as_deref()
                .filter(|v| !v.is_empty())
                .is_none()
        {
            return Err(Error::Validation(
                "Replace migration requires a new value".to_string(),
            ));
        }
    }
    Ok(())
}

fn check_unique_ids(elements: &[RangeElement]) -> Result<()> {
    fn walk(elements: &[RangeElement], seen: &mut HashSet<String>) -> Result<()> {
        for el in elements {
            if !seen.insert(el.id.clone()) {
                return Err(Error::Validation(format!(
                    "Duplicate element id '{}'",
                    el.id
                )));
            }
            walk(&el.children, seen)?;
        }
        Ok(())
    }
    walk(elements, &mut HashSet::new())
}

fn ensure_guids(elements: &mut [RangeElement]) {
    for el in elements {
        if el.guid.is_empty() {
            el.guid = Uuid::new_v4().to_string();
        }
        ensure_guids(&mut el.children);
    }
}

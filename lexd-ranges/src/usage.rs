//! Usage scanning and guarded bulk migration
//!
//! Dictionary records reference range values from differently-shaped fields:
//! a dedicated structural field (grammatical category, relation type) or a
//! generic named trait. The query shape is decided here per range id, and
//! callers never assume one universal template.
//!
//! All migration validation happens before any store round-trip. There is no
//! compensating rollback for a partially-applied bulk mutation; the store's
//! bulk update is assumed atomic at the single-query level.

use crate::model::Range;
use crate::store::{self, queries, CanonicalStore};
use lexd_common::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Samples attached per element in a usage summary
const SAMPLE_LIMIT: usize = 5;

/// How a range's values are referenced by dictionary records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageQueryShape {
    /// Sense-level grammatical category attribute
    GrammaticalCategory,
    /// Entry-level relation type attribute
    RelationType,
    /// Generic named trait; the trait name is the range id
    Trait(String),
}

/// Decide the query shape for a range id
pub fn query_shape(range_id: &str) -> UsageQueryShape {
    match range_id {
        "grammatical-info" | "from-part-of-speech" => UsageQueryShape::GrammaticalCategory,
        "lexical-relation" | "lexical-relations" => UsageQueryShape::RelationType,
        other => UsageQueryShape::Trait(other.to_string()),
    }
}

/// One record referencing a range value
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub record_id: String,
    pub display_label: String,
    /// References within this one record
    pub count: u64,
}

/// A sample referencing record in a usage summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSample {
    pub record_id: String,
    pub display_label: String,
}

/// Per-value usage within a summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementUsage {
    pub count: u64,
    pub label: String,
    pub sample_entries: Vec<UsageSample>,
}

/// Distinct-value usage aggregation for one range
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub total_entries: u64,
    pub elements: BTreeMap<String, ElementUsage>,
}

/// Bulk-migration operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationOp {
    Replace,
    Remove,
}

/// Outcome of a bulk migration (or its dry run)
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub entries_affected: u64,
    pub fields_updated: u64,
}

/// Usage & migration engine over the canonical store
pub struct UsageScanner {
    store: Arc<dyn CanonicalStore>,
}

impl UsageScanner {
    pub fn new(store: Arc<dyn CanonicalStore>) -> Self {
        Self { store }
    }

    /// Every record whose relevant field references the range, or one
    /// specific value of it.
    pub async fn find_range_usage(
        &self,
        range_id: &str,
        element_value: Option<&str>,
    ) -> Result<Vec<UsageRecord>> {
        let shape = query_shape(range_id);
        let query = queries::usage_records(self.store.database(), &shape, element_value);
        let text = self.store.execute_query(&query).await?;
        let records = decode_usage_records(&text)?;
        debug!(
            range_id,
            value = element_value.unwrap_or("<any>"),
            records = records.len(),
            "Scanned range usage"
        );
        Ok(records)
    }

    /// Distinct-value usage aggregation with up to 5 sample records per
    /// value. Element labels come from the canonical range when available.
    pub async fn get_usage_by_element(&self, range_id: &str) -> Result<UsageSummary> {
        let shape = query_shape(range_id);
        let query = queries::usage_by_element(self.store.database(), &shape, SAMPLE_LIMIT);
        let text = self.store.execute_query(&query).await?;
        let (total_entries, raw) = decode_usage_summary(&text)?;

        let range = store::fetch_range(self.store.as_ref(), range_id).await?;
        let elements = raw
            .into_iter()
            .map(|(value, (count, sample_entries))| {
                let label = element_label(range.as_ref(), &value);
                (
                    value,
                    ElementUsage {
                        count,
                        label,
                        sample_entries,
                    },
                )
            })
            .collect();

        Ok(UsageSummary {
            total_entries,
            elements,
        })
    }

    /// Bulk rewrite or removal of every reference to `old_value`.
    ///
    /// All validation happens before any store round-trip; a dry run
    /// computes the affected counts and issues no mutation.
    pub async fn migrate_range_values(
        &self,
        range_id: &str,
        old_value: &str,
        operation: MigrationOp,
        new_value: Option<&str>,
        dry_run: bool,
    ) -> Result<MigrationResult> {
        let replacement = match operation {
            MigrationOp::Replace => Some(
                new_value
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| {
                        Error::Validation(
                            "Replace migration requires a new value".to_string(),
                        )
                    })?,
            ),
            MigrationOp::Remove => None,
        };

        let usage = self.find_range_usage(range_id, Some(old_value)).await?;
        let result = MigrationResult {
            entries_affected: usage.len() as u64,
            fields_updated: usage.iter().map(|r| r.count).sum(),
        };

        if dry_run {
            debug!(
                range_id,
                old_value,
                entries = result.entries_affected,
                "Dry-run migration; no mutation issued"
            );
            return Ok(result);
        }

        if result.entries_affected == 0 {
            return Ok(result);
        }

        let shape = query_shape(range_id);
        let query = match replacement {
            Some(new_value) => {
                queries::migrate_replace(self.store.database(), &shape, old_value, new_value)
            }
            None => queries::migrate_remove(self.store.database(), &shape, old_value),
        };
        self.store.execute_update(&query).await?;

        info!(
            range_id,
            old_value,
            ?operation,
            entries = result.entries_affected,
            fields = result.fields_updated,
            "Migrated range values"
        );
        Ok(result)
    }
}

fn element_label(range: Option<&Range>, value: &str) -> String {
    range
        .and_then(|r| {
            r.find_element(value)
                .or_else(|| find_by_value(r, value))
                .and_then(|el| el.label_text())
        })
        .unwrap_or(value)
        .to_string()
}

fn find_by_value<'a>(range: &'a Range, value: &str) -> Option<&'a crate::model::RangeElement> {
    fn walk<'a>(
        elements: &'a [crate::model::RangeElement],
        value: &str,
    ) -> Option<&'a crate::model::RangeElement> {
        for el in elements {
            if el.reference_value() == value {
                return Some(el);
            }
            if let Some(found) = walk(&el.children, value) {
                return Some(found);
            }
        }
        None
    }
    walk(&range.elements, value)
}

/// Decode `<usage><record id label count/>...</usage>`
fn decode_usage_records(xml: &str) -> Result<Vec<UsageRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut records = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"record" {
                    records.push(UsageRecord {
                        record_id: attr(e, b"id"),
                        display_label: attr(e, b"label"),
                        count: attr(e, b"count").parse().unwrap_or(0),
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Internal(format!(
                    "Usage result parse error: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(records)
}

type RawSummary = BTreeMap<String, (u64, Vec<UsageSample>)>;

/// Decode `<usage total><element value count><record id label/>..</element></usage>`
fn decode_usage_summary(xml: &str) -> Result<(u64, RawSummary)> {
    let mut reader = Reader::from_str(xml);
    let mut total = 0u64;
    let mut elements: RawSummary = BTreeMap::new();
    let mut current: Option<(String, u64, Vec<UsageSample>)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"usage" => total = attr(e, b"total").parse().unwrap_or(0),
                b"element" => {
                    current = Some((
                        attr(e, b"value"),
                        attr(e, b"count").parse().unwrap_or(0),
                        Vec::new(),
                    ));
                }
                b"record" => {
                    if let Some((_, _, samples)) = current.as_mut() {
                        samples.push(UsageSample {
                            record_id: attr(e, b"id"),
                            display_label: attr(e, b"label"),
                        });
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"usage" => total = attr(e, b"total").parse().unwrap_or(0),
                b"element" => {
                    elements.insert(
                        attr(e, b"value"),
                        (attr(e, b"count").parse().unwrap_or(0), Vec::new()),
                    );
                }
                b"record" => {
                    if let Some((_, _, samples)) = current.as_mut() {
                        samples.push(UsageSample {
                            record_id: attr(e, b"id"),
                            display_label: attr(e, b"label"),
                        });
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"element" {
                    if let Some((value, count, samples)) = current.take() {
                        elements.insert(value, (count, samples));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Internal(format!(
                    "Usage result parse error: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    Ok((total, elements))
}

fn attr(e: &quick_xml::events::BytesStart, name: &[u8]) -> String {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
        .unwrap_or_default()
}

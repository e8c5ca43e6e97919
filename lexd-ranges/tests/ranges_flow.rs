//! End-to-end flows over the public ranges API
//!
//! Drives the reconciler, mutator, and usage scanner together against an
//! in-memory canonical store double and an in-memory SQLite pool.

use anyhow::Result;
use async_trait::async_trait;
use lexd_common::config::RangeConfig;
use lexd_common::db::{create_tables, insert_custom_range};
use lexd_ranges::store::queries;
use lexd_ranges::{
    CanonicalStore, MigrationOp, RangeCache, RangeElementData, RangeMigration, RangeMutator,
    RangeReconciler, UsageScanner,
};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Canned-response canonical store double
struct FakeStore {
    database: String,
    responses: Mutex<HashMap<String, String>>,
    updates: Mutex<Vec<String>>,
}

impl FakeStore {
    fn shared() -> Arc<Self> {
        Arc::new(Self {
            database: "lexicon".to_string(),
            responses: Mutex::new(HashMap::new()),
            updates: Mutex::new(Vec::new()),
        })
    }

    fn respond(&self, query: impl Into<String>, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .insert(query.into(), response.into());
    }

    fn updates(&self) -> Vec<String> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl CanonicalStore for FakeStore {
    async fn connect(&self) -> lexd_common::Result<()> {
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn execute_query(&self, query: &str) -> lexd_common::Result<String> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default())
    }

    async fn execute_update(&self, query: &str) -> lexd_common::Result<()> {
        self.updates.lock().unwrap().push(query.to_string());
        Ok(())
    }

    fn database(&self) -> &str {
        &self.database
    }
}

const RANGES_DOC: &str = r#"<lift-ranges>
  <range id="grammatical-info" guid="g-1">
    <label><form lang="en"><text>Grammatical Category</text></form></label>
    <range-element id="noun" guid="e-1">
      <label><form lang="en"><text>Noun</text></form></label>
      <abbrev><form lang="en"><text>n</text></form></abbrev>
    </range-element>
    <range-element id="proper-noun" guid="e-2" parent="noun"/>
  </range>
</lift-ranges>"#;

async fn setup_pool() -> Result<SqlitePool> {
    let pool = SqlitePool::connect(":memory:").await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    create_tables(&pool).await?;
    Ok(pool)
}

#[tokio::test]
async fn merged_view_reaches_all_three_sources() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("lexd_ranges=debug")
        .try_init();

    let store = FakeStore::shared();
    store.respond(queries::all_ranges("lexicon"), RANGES_DOC);

    let pool = setup_pool().await?;
    insert_custom_range(
        &pool,
        "proj-1",
        "custom",
        "dialect-labels",
        "northern",
        Some("Northern"),
        None,
        &[],
    )
    .await?;

    let config_text = r#"
        [ranges.translation-type]
        label = "Translation Type"
        type = "fieldworks"
    "#;
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("ranges.toml");
    std::fs::write(&config_path, config_text)?;
    let config = RangeConfig::load(&config_path)?;

    let cache = Arc::new(RangeCache::new());
    let reconciler = RangeReconciler::new(store.clone(), pool, Arc::new(config), cache);

    let ranges = reconciler.get_all_ranges("proj-1").await?;
    assert_eq!(ranges.len(), 3);

    assert!(ranges["grammatical-info"].official);
    assert!(!ranges["dialect-labels"].official);
    assert!(ranges["translation-type"].provided_by_config);

    // Inherited display values on the resolved view
    let resolved = reconciler
        .get_range("grammatical-info", "proj-1", true)
        .await?;
    let noun = &resolved.elements[0];
    assert_eq!(noun.children[0].effective_label.as_deref(), Some("Noun"));
    assert_eq!(noun.children[0].effective_abbrev.as_deref(), Some("n"));

    Ok(())
}

#[tokio::test]
async fn mutation_invalidates_the_merged_view() -> Result<()> {
    let store = FakeStore::shared();
    store.respond(queries::all_ranges("lexicon"), RANGES_DOC);
    store.respond(
        queries::range_by_id("lexicon", "grammatical-info"),
        r#"<range id="grammatical-info" guid="g-1">
             <range-element id="noun" guid="e-1"/>
           </range>"#,
    );

    let pool = setup_pool().await?;
    let cache = Arc::new(RangeCache::new());
    let reconciler = RangeReconciler::new(
        store.clone(),
        pool.clone(),
        Arc::new(RangeConfig::empty()),
        cache.clone(),
    );
    let mutator = RangeMutator::new(store.clone(), pool, cache.clone());

    reconciler.get_all_ranges("proj-1").await?;
    assert!(cache.get("proj-1").is_some());

    mutator
        .create_range_element(
            "proj-1",
            "grammatical-info",
            RangeElementData {
                id: Some("verb".to_string()),
                ..Default::default()
            },
        )
        .await?;

    assert!(cache.get("proj-1").is_none());
    assert_eq!(store.updates().len(), 1);
    Ok(())
}

#[tokio::test]
async fn guarded_delete_requires_and_applies_a_migration() -> Result<()> {
    let store = FakeStore::shared();
    store.respond(
        queries::range_by_id("lexicon", "usage-type"),
        r#"<range id="usage-type" guid="g-2">
             <range-element id="archaic" value="Archaic"/>
           </range>"#,
    );
    let shape = lexd_ranges::usage::query_shape("usage-type");
    store.respond(
        queries::usage_records("lexicon", &shape, Some("Archaic")),
        r#"<usage><record id="entry-1" label="thou" count="2"/></usage>"#,
    );

    let pool = setup_pool().await?;
    let cache = Arc::new(RangeCache::new());
    let mutator = RangeMutator::new(store.clone(), pool, cache);
    let scanner = UsageScanner::new(store.clone());

    // Dry run reports the count without touching anything
    let dry = scanner
        .migrate_range_values("usage-type", "Archaic", MigrationOp::Replace, Some("Obsolete"), true)
        .await?;
    assert_eq!(dry.entries_affected, 1);
    assert_eq!(dry.fields_updated, 2);
    assert!(store.updates().is_empty());

    // Deleting the in-use element without a migration is refused
    let err = mutator
        .delete_range_element("proj-1", "usage-type", "archaic", None)
        .await
        .unwrap_err();
    assert!(matches!(err, lexd_common::Error::Validation(_)));

    // With a replace migration the rewrite runs before the node delete
    let migration = RangeMigration {
        operation: MigrationOp::Replace,
        new_value: Some("Obsolete".to_string()),
    };
    mutator
        .delete_range_element("proj-1", "usage-type", "archaic", Some(&migration))
        .await?;

    let updates = store.updates();
    assert_eq!(updates.len(), 2);
    assert!(updates[0].contains("replace value of node"));
    assert!(updates[1].starts_with("delete node"));
    Ok(())
}

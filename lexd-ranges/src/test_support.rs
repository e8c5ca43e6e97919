//! In-memory canonical store for unit tests

use crate::store::CanonicalStore;
use async_trait::async_trait;
use lexd_common::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock canonical store: canned responses keyed by exact query text, plus a
/// log of every query and update issued.
pub(crate) struct MockStore {
    database: String,
    responses: Mutex<HashMap<String, String>>,
    queries: Mutex<Vec<String>>,
    updates: Mutex<Vec<String>>,
}

impl MockStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self {
            database: "lexicon-test".to_string(),
            responses: Mutex::new(HashMap::new()),
            queries: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        })
    }

    /// Register the response for one exact query string
    pub fn respond(&self, query: impl Into<String>, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .insert(query.into(), response.into());
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl CanonicalStore for MockStore {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn execute_query(&self, query: &str) -> Result<String> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default())
    }

    async fn execute_update(&self, query: &str) -> Result<()> {
        self.updates.lock().unwrap().push(query.to_string());
        Ok(())
    }

    fn database(&self) -> &str {
        &self.database
    }
}
